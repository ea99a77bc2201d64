//! Block locator extraction from collection manifests
//!
//! A manifest is one line per stream:
//!
//! ```text
//! . acbd18db4cc2f85cedef654fccc4a4d8+3+A8f1e...@65f2a0b1 0:3:foo.txt
//! ./sub 37b51d194a7513e45b56f6524f2d51f2+3 0:3:bar.txt
//! ```
//!
//! The first token names the stream, then come block locators
//! (`<md5>+<size>[+hint...]`), then file segments (`pos:len:name`).

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static LOCATOR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-f]{32})\+([0-9]+)(\+\S+)*$").expect("Invalid locator regex")
});

/// A data block referenced by a manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockLocator {
    /// MD5 of the block content, lowercase hex
    pub hash: String,

    /// Block size in bytes
    pub size: u64,
}

impl BlockLocator {
    /// Parse a locator token; hints (signatures, remote ids) are dropped
    pub fn parse(token: &str) -> Option<Self> {
        let caps = LOCATOR_REGEX.captures(token)?;
        let hash = caps.get(1)?.as_str().to_string();
        let size = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { hash, size })
    }
}

/// Distinct blocks referenced by `manifest`, in first-seen order
pub fn block_locators(manifest: &str) -> Vec<BlockLocator> {
    let mut seen = HashSet::new();
    let mut blocks = Vec::new();

    for line in manifest.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next().is_none() {
            continue;
        }

        for token in tokens {
            let Some(locator) = BlockLocator::parse(token) else {
                break;
            };
            if seen.insert(locator.hash.clone()) {
                blocks.push(locator);
            }
        }
    }

    blocks
}

/// Sum of block sizes
pub fn referenced_bytes(blocks: &[BlockLocator]) -> u64 {
    blocks.iter().map(|b| b.size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOO: &str = "acbd18db4cc2f85cedef654fccc4a4d8";
    const BAR: &str = "37b51d194a7513e45b56f6524f2d51f2";

    #[test]
    fn test_parse_locator() {
        let loc = BlockLocator::parse(&format!("{}+3", FOO)).unwrap();
        assert_eq!(loc.hash, FOO);
        assert_eq!(loc.size, 3);

        let signed = format!("{}+3+A0123456789abcdef@65f2a0b1", FOO);
        assert_eq!(BlockLocator::parse(&signed), Some(loc));
    }

    #[test]
    fn test_parse_rejects_non_locators() {
        assert!(BlockLocator::parse("0:3:foo.txt").is_none());
        assert!(BlockLocator::parse(".").is_none());
        assert!(BlockLocator::parse(FOO).is_none());
        assert!(BlockLocator::parse(&format!("{}+x", FOO)).is_none());
        assert!(BlockLocator::parse(&format!("{}+3", FOO.to_uppercase())).is_none());
    }

    #[test]
    fn test_block_locators() {
        let manifest = format!(
            ". {foo}+3+Asig@1 {bar}+3 0:3:foo.txt 3:3:bar.txt\n./sub {foo}+3 0:3:again.txt\n",
            foo = FOO,
            bar = BAR
        );

        let blocks = block_locators(&manifest);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].hash, FOO);
        assert_eq!(blocks[1].hash, BAR);
        assert_eq!(referenced_bytes(&blocks), 6);
    }

    #[test]
    fn test_stops_at_file_segments() {
        // a file named like a locator must not be counted
        let manifest = format!(". {}+3 0:3:{}+9\n", FOO, BAR);
        let blocks = block_locators(&manifest);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_empty_manifest() {
        assert!(block_locators("").is_empty());
        assert!(block_locators("\n\n").is_empty());
        assert_eq!(referenced_bytes(&[]), 0);
    }
}
