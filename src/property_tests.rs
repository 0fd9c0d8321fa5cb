//! Property-based tests for chunk-boundary independence

#[cfg(test)]
mod tests {
    use crate::config::FeedConfig;
    use crate::error::FeedErrorKind;
    use crate::feed::{split_chunks, ChangesStream, CollectingHandler, FeedMode};
    use proptest::prelude::*;

    /// Cut `input` at the given positions, keeping empty pieces
    fn cut(input: &[u8], mut points: Vec<usize>) -> Vec<Vec<u8>> {
        points.iter_mut().for_each(|p| *p %= input.len() + 1);
        points.sort_unstable();

        let mut pieces = Vec::with_capacity(points.len() + 1);
        let mut from = 0;
        for point in points {
            pieces.push(input[from..point].to_vec());
            from = point;
        }
        pieces.push(input[from..].to_vec());
        pieces
    }

    fn record_strategy() -> impl Strategy<Value = String> {
        (
            "[a-z0-9-]{1,12}",
            1u32..500,
            prop::collection::vec("[a-zA-Z0-9 {}\\[\\],:]{0,8}", 0..3),
        )
            .prop_map(|(id, seq, notes)| {
                serde_json::json!({
                    "seq": seq,
                    "id": id,
                    "changes": [{"rev": format!("1-{id}")}],
                    "notes": notes,
                })
                .to_string()
            })
    }

    // Property test: long-poll records do not depend on chunk boundaries
    proptest! {
        #[test]
        fn test_long_poll_chunking_is_invisible(
            records in prop::collection::vec(record_strategy(), 0..6),
            points in prop::collection::vec(any::<usize>(), 0..12),
        ) {
            let body = format!("{{\"results\":[{}],\"last_seq\":42}}\n", records.join(",\n"));
            let chunks = cut(body.as_bytes(), points);

            let (split, outcome) =
                split_chunks(FeedMode::LongPoll, &FeedConfig::long_poll(), &chunks).unwrap();
            prop_assert_eq!(&split, &records);
            prop_assert!(outcome.complete);
            prop_assert_eq!(outcome.last_seq, Some(serde_json::json!(42)));

            let mut stream = ChangesStream::new(FeedConfig::long_poll(), CollectingHandler::new());
            for chunk in &chunks {
                stream.write(chunk).unwrap();
            }
            stream.end().unwrap();
            let delivered: Vec<String> = stream
                .handler()
                .records()
                .into_iter()
                .map(str::to_string)
                .collect();
            prop_assert_eq!(delivered, records);
        }
    }

    // Property test: continuous lines do not depend on chunk boundaries
    proptest! {
        #[test]
        fn test_continuous_chunking_is_invisible(
            records in prop::collection::vec(record_strategy(), 0..6),
            heartbeats in prop::collection::vec(any::<bool>(), 0..6),
            crlf in any::<bool>(),
            points in prop::collection::vec(any::<usize>(), 0..12),
        ) {
            let newline = if crlf { "\r\n" } else { "\n" };
            let mut body = String::new();
            for (i, record) in records.iter().enumerate() {
                if heartbeats.get(i).copied().unwrap_or(false) {
                    body.push_str(newline);
                }
                body.push_str(record);
                body.push_str(newline);
            }
            let chunks = cut(body.as_bytes(), points);

            let (split, outcome) =
                split_chunks(FeedMode::Continuous, &FeedConfig::continuous(), &chunks).unwrap();
            prop_assert_eq!(split, records);
            prop_assert_eq!(outcome.discarded, 0);
        }
    }

    // Property test: any divergence from the results literal is rejected
    proptest! {
        #[test]
        fn test_envelope_divergence_rejected(
            position in 0usize..12,
            replacement in any::<u8>(),
            points in prop::collection::vec(any::<usize>(), 0..4),
        ) {
            let mut body = br#"{"results":[{"a":1}]}"#.to_vec();
            prop_assume!(body[position] != replacement);
            body[position] = replacement;

            let mut stream = ChangesStream::new(FeedConfig::long_poll(), CollectingHandler::new());
            let mut failure = None;
            for chunk in cut(&body, points) {
                if let Err(e) = stream.write(&chunk) {
                    failure = Some(e);
                    break;
                }
            }

            let err = failure.unwrap();
            prop_assert_eq!(err.kind(), FeedErrorKind::MalformedEnvelope);
            prop_assert!(stream.handler().records().is_empty());
        }
    }
}
