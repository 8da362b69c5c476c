//! Parsing of bmaptool block maps.
//!
//! A block map describes which blocks of a (usually sparse) image hold data.
//! Writing only those blocks skips the long runs of zeros most OS images carry.
//! Version 2.x maps carry a SHA-256 digest for every range, which is used for
//! validation; the SHA-1 digests of older maps are ignored.
use anyhow::{Context, Result, anyhow, bail};
use roxmltree::{Document, Node};
use std::ops::Range;

/// A parsed block map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMap {
    /// Size of the image the map describes, in bytes.
    pub image_size: u64,
    /// Size of one block, in bytes.
    pub block_size: u64,
    /// Number of blocks in the image.
    pub blocks_count: u64,
    /// The mapped ranges, in the order they appear in the map.
    pub ranges: Vec<MappedRange>,
}

/// An inclusive run of mapped blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRange {
    pub first: u64,
    pub last: u64,
    /// Lower-case hex SHA-256 of the range's bytes, if the map provides one.
    pub checksum: Option<String>,
}

impl BlockMap {
    /// Parses the XML text of a block map.
    ///
    /// # Errors
    ///
    /// Fails if the text is not XML, a required element is missing or not a
    /// number, a range lies outside the image, or the map uses a checksum type
    /// other than `sha1` or `sha256`.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml).context("Block map is not valid XML")?;
        let root = doc.root_element();
        if !root.has_tag_name("bmap") {
            bail!(
                "Block map root element is <{}>, expected <bmap>",
                root.tag_name().name()
            );
        }

        let image_size = number(root, "ImageSize")?;
        let block_size = number(root, "BlockSize")?;
        let blocks_count = number(root, "BlocksCount")?;
        if block_size == 0 {
            bail!("Block map declares a block size of zero");
        }

        let sha256 = match text(root, "ChecksumType") {
            None | Some("sha1") => false,
            Some("sha256") => true,
            Some(other) => bail!("Unsupported block map checksum type: {other}"),
        };

        let block_map = child(root, "BlockMap")
            .ok_or_else(|| anyhow!("Block map has no <BlockMap> element"))?;

        let mut ranges = Vec::new();
        for node in block_map.children().filter(|n| n.has_tag_name("Range")) {
            let spec = node.text().unwrap_or("").trim();
            let (first, last) = match spec.split_once('-') {
                Some((first, last)) => (block_index(first)?, block_index(last)?),
                None => {
                    let block = block_index(spec)?;
                    (block, block)
                }
            };

            if first > last || last >= blocks_count {
                bail!("Block map range `{spec}` is outside the image's {blocks_count} blocks");
            }

            let checksum = if sha256 {
                node.attribute("chksum").map(|c| c.trim().to_ascii_lowercase())
            } else {
                None
            };

            ranges.push(MappedRange {
                first,
                last,
                checksum,
            });
        }

        Ok(Self {
            image_size,
            block_size,
            blocks_count,
            ranges,
        })
    }

    /// The bytes of the image covered by `range`. The final block is cut
    /// short when the image size is not a multiple of the block size.
    pub fn byte_range(&self, range: &MappedRange) -> Range<u64> {
        let end = range
            .last
            .saturating_add(1)
            .saturating_mul(self.block_size)
            .min(self.image_size);
        let start = range.first.saturating_mul(self.block_size).min(end);
        start..end
    }

    /// Total number of mapped bytes.
    pub fn mapped_bytes(&self) -> u64 {
        self.ranges
            .iter()
            .map(|r| {
                let bytes = self.byte_range(r);
                bytes.end - bytes.start
            })
            .sum()
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text()).map(str::trim)
}

fn number(node: Node<'_, '_>, name: &str) -> Result<u64> {
    let value = text(node, name).ok_or_else(|| anyhow!("Block map has no <{name}> element"))?;
    value
        .parse()
        .with_context(|| format!("Block map <{name}> is not a number: `{value}`"))
}

fn block_index(value: &str) -> Result<u64> {
    let value = value.trim();
    value
        .parse()
        .with_context(|| format!("Block map range has an invalid block number: `{value}`"))
}
