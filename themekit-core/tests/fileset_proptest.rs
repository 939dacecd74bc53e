use std::collections::HashSet;
use std::fs;

use proptest::prelude::*;
use tempfile::TempDir;
use themekit_core::fileset::{resolve, FileSetPattern, GlobList};

const NAMES: [&str; 8] = [
    "a.js",
    "b.css",
    "_c.scss",
    "d.scss",
    "lib/e.js",
    "lib/_f.scss",
    "lib/deep/g.css",
    "vendor/h.js",
];

const GLOBS: [&str; 8] = [
    "*.js",
    "**/*.js",
    "**/*.scss",
    "_*.scss",
    "lib/**",
    "vendor/**",
    "**/*.css",
    "*",
];

fn gen_globs() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    (
        prop::collection::vec(0..GLOBS.len(), 1..4),
        prop::collection::vec(0..GLOBS.len(), 0..3),
    )
}

proptest! {
    #[test]
    fn test_resolution_is_union_minus_negations((pos, neg) in gen_globs()) {
        let temp = TempDir::new().unwrap();
        for name in NAMES {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, name).unwrap();
        }

        let mut src: Vec<String> = pos.iter().map(|i| GLOBS[*i].to_string()).collect();
        src.extend(neg.iter().map(|i| format!("!{}", GLOBS[*i])));

        let positive = GlobList::new(&pos.iter().map(|i| GLOBS[*i]).collect::<Vec<_>>()).unwrap();
        let negative = GlobList::new(&neg.iter().map(|i| GLOBS[*i]).collect::<Vec<_>>()).unwrap();
        let expected: HashSet<&str> = NAMES
            .iter()
            .copied()
            .filter(|n| positive.matches(n) && !negative.matches(n))
            .collect();

        let pattern = FileSetPattern::new("./", src, "out/");
        let resolved: Vec<String> = resolve(&pattern, temp.path())
            .unwrap()
            .files
            .into_iter()
            .map(|f| f.relative)
            .collect();

        let unique: HashSet<&str> = resolved.iter().map(String::as_str).collect();
        prop_assert_eq!(unique.len(), resolved.len(), "duplicates in {:?}", resolved);
        prop_assert_eq!(unique, expected);
    }
}
