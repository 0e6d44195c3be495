use hearline_core::{TranscriptSegment, WordTiming};

use crate::speaker::SpeakerMap;
use crate::transcription::TranscriptionOutput;

/// Folds one flush's chronologically ordered word list into speaker
/// segments, offsetting word times by the batch's start timestamp into
/// absolute session time. Deterministic: the same input always yields the
/// same segments.
pub fn assemble_segments(
    output: &TranscriptionOutput,
    batch_start: f64,
    batch_end: f64,
    speakers: &mut SpeakerMap,
) -> Vec<TranscriptSegment> {
    match output {
        TranscriptionOutput::Words(words) => assemble_from_words(words, batch_start, speakers),
        TranscriptionOutput::FullText(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            // no word-level data: one segment spanning the whole batch under
            // the default single-speaker label
            vec![TranscriptSegment {
                speaker_id: "S1".to_string(),
                text: trimmed.to_string(),
                start_time: batch_start,
                end_time: batch_end,
                words: vec![],
            }]
        }
    }
}

fn assemble_from_words(
    words: &[WordTiming],
    batch_start: f64,
    speakers: &mut SpeakerMap,
) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();

    let mut current_tag: Option<&str> = None;
    let mut run: Vec<&WordTiming> = Vec::new();

    let mut emit = |tag: &str, run: &[&WordTiming], speakers: &mut SpeakerMap| {
        if run.is_empty() {
            return;
        }
        let text = run
            .iter()
            .map(|w| w.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        segments.push(TranscriptSegment {
            speaker_id: speakers.canonical(tag),
            text,
            start_time: batch_start + run[0].start,
            end_time: batch_start + run[run.len() - 1].end,
            words: run
                .iter()
                .map(|w| WordTiming {
                    speaker_tag: w.speaker_tag.clone(),
                    text: w.text.trim().to_string(),
                    start: batch_start + w.start,
                    end: batch_start + w.end,
                })
                .collect(),
        });
    };

    for word in words {
        if word.text.trim().is_empty() {
            continue;
        }
        match current_tag {
            Some(tag) if tag == word.speaker_tag => run.push(word),
            Some(tag) => {
                emit(tag, &run, speakers);
                run.clear();
                run.push(word);
                current_tag = Some(&word.speaker_tag);
            }
            None => {
                run.push(word);
                current_tag = Some(&word.speaker_tag);
            }
        }
    }
    if let Some(tag) = current_tag {
        emit(tag, &run, speakers);
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(tag: &str, text: &str, start: f64, end: f64) -> WordTiming {
        WordTiming {
            speaker_tag: tag.to_string(),
            text: text.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn folds_consecutive_same_speaker_words() {
        let mut speakers = SpeakerMap::new();
        let output = TranscriptionOutput::Words(vec![
            word("A", "hi", 0.0, 1.0),
            word("A", "there", 1.0, 2.0),
            word("B", "yo", 2.0, 3.0),
        ]);

        let segments = assemble_segments(&output, 10.0, 15.0, &mut speakers);
        assert_eq!(segments.len(), 2);

        assert_eq!(segments[0].speaker_id, "S1");
        assert_eq!(segments[0].text, "hi there");
        assert!((segments[0].start_time - 10.0).abs() < 1e-9);
        assert!((segments[0].end_time - 12.0).abs() < 1e-9);

        assert_eq!(segments[1].speaker_id, "S2");
        assert_eq!(segments[1].text, "yo");
        assert!((segments[1].start_time - 12.0).abs() < 1e-9);
        assert!((segments[1].end_time - 13.0).abs() < 1e-9);
    }

    #[test]
    fn reassembly_is_idempotent() {
        let words = vec![
            word("A", "one", 0.0, 0.5),
            word("B", "two", 0.5, 1.0),
            word("A", "three", 1.0, 1.5),
        ];
        let output = TranscriptionOutput::Words(words);

        let mut speakers_a = SpeakerMap::new();
        let mut speakers_b = SpeakerMap::new();
        let first = assemble_segments(&output, 2.0, 4.0, &mut speakers_a);
        let second = assemble_segments(&output, 2.0, 4.0, &mut speakers_b);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_and_whitespace_words_are_dropped() {
        let mut speakers = SpeakerMap::new();
        let output = TranscriptionOutput::Words(vec![
            word("A", "  ", 0.0, 0.2),
            word("A", "kept", 0.2, 0.6),
            word("A", "", 0.6, 0.7),
        ]);

        let segments = assemble_segments(&output, 0.0, 1.0, &mut speakers);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "kept");
        assert_eq!(segments[0].words.len(), 1);
    }

    #[test]
    fn all_empty_words_yield_no_segments() {
        let mut speakers = SpeakerMap::new();
        let output = TranscriptionOutput::Words(vec![word("A", " ", 0.0, 0.2)]);
        assert!(assemble_segments(&output, 0.0, 1.0, &mut speakers).is_empty());
        assert!(speakers.is_empty());
    }

    #[test]
    fn full_text_fallback_spans_the_whole_batch() {
        let mut speakers = SpeakerMap::new();
        let output = TranscriptionOutput::FullText("all of it".to_string());

        let segments = assemble_segments(&output, 5.0, 10.0, &mut speakers);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker_id, "S1");
        assert_eq!(segments[0].text, "all of it");
        assert!((segments[0].start_time - 5.0).abs() < 1e-9);
        assert!((segments[0].end_time - 10.0).abs() < 1e-9);
    }

    #[test]
    fn blank_full_text_yields_no_segments() {
        let mut speakers = SpeakerMap::new();
        let output = TranscriptionOutput::FullText("   ".to_string());
        assert!(assemble_segments(&output, 0.0, 5.0, &mut speakers).is_empty());
    }

    #[test]
    fn speaker_labels_stay_stable_across_batches() {
        let mut speakers = SpeakerMap::new();
        let first = TranscriptionOutput::Words(vec![
            word("b", "x", 0.0, 0.5),
            word("a", "y", 0.5, 1.0),
        ]);
        let second = TranscriptionOutput::Words(vec![
            word("b", "z", 0.0, 0.5),
            word("c", "w", 0.5, 1.0),
        ]);

        let s1 = assemble_segments(&first, 0.0, 1.0, &mut speakers);
        let s2 = assemble_segments(&second, 5.0, 6.0, &mut speakers);

        assert_eq!(s1[0].speaker_id, "S1"); // b
        assert_eq!(s1[1].speaker_id, "S2"); // a
        assert_eq!(s2[0].speaker_id, "S1"); // b again
        assert_eq!(s2[1].speaker_id, "S3"); // c
    }
}
