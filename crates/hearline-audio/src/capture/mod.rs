mod device;
mod stream;
mod wav;

pub use device::{default_input_device, list_audio_devices, AudioDevice};
pub use stream::CaptureStream;
pub use wav::frames_from_wav;
