use dynamic_path::{Path, PathError};
use proptest::prelude::*;

fn arb_segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.~ -]{1,12}"
}

fn arb_path() -> impl Strategy<Value = Path> {
    prop::collection::vec(arb_segment(), 0..8).prop_map(Path::from)
}

proptest! {
    #[test]
    fn path_text_round_trip(path in arb_path()) {
        let text = path.to_string();
        prop_assert_eq!(Path::parse(&text), path.clone());
        prop_assert_eq!(text.parse::<Path>(), Ok(path));
    }

    #[test]
    fn text_path_round_trip(segments in prop::collection::vec(arb_segment(), 1..8)) {
        let text = segments.join("/");
        prop_assert_eq!(Path::parse(&text).to_string(), text);
    }

    #[test]
    fn prepend_matches_parse(segments in prop::collection::vec(arb_segment(), 1..8)) {
        let mut built = Path::new();
        for segment in segments.iter().rev() {
            built.prepend(segment.clone());
        }
        prop_assert_eq!(built, Path::parse(&segments.join("/")));
    }

    #[test]
    fn parent_is_strict_prefix(path in arb_path()) {
        match path.parent() {
            Ok(parent) => prop_assert!(path.is_child_of(&parent)),
            Err(err) => {
                prop_assert!(path.is_root());
                prop_assert_eq!(err, PathError::NoParent);
            }
        }
    }
}

#[test]
fn segment_with_separator_does_not_round_trip() {
    let path = Path::from_segment("a/b");
    assert_eq!(path.validate(), Err(PathError::SeparatorInSegment { index: 0 }));
    assert_ne!(Path::parse(&path.to_string()), path);
}
