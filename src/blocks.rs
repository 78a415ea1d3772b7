//! Structured content blocks.
//!
//! A cut-down StreamField: pages carry an ordered list of typed blocks,
//! serde round-trippable so the host CMS can persist them as JSON. The only
//! validation rule in scope is the image block's alt-text requirement.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pages::PageId;

/// An ordered sequence of content blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamField {
    blocks: Vec<Block>,
}

impl StreamField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    /// Validate every block, collecting the first failing block's errors.
    pub fn clean(&self) -> Result<(), BlockValidationError> {
        for block in &self.blocks {
            block.clean()?;
        }
        Ok(())
    }
}

/// A content block instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Image(ImageBlock),
    PageRef(PageRefBlock),
    Paragraph(ParagraphBlock),
}

impl Block {
    pub fn clean(&self) -> Result<(), BlockValidationError> {
        match self {
            Block::Image(image) => image.clean(),
            Block::PageRef(_) | Block::Paragraph(_) => Ok(()),
        }
    }
}

/// Single image with mandatory alt text and optional caption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBlock {
    /// Media id of the chosen image, if one was picked.
    pub image: Option<u64>,

    /// Explain the image.
    #[serde(default)]
    pub image_alt_text: String,

    #[serde(default)]
    pub image_caption: String,
}

impl ImageBlock {
    /// An image without alt text is rejected with an error keyed to the
    /// `image_alt_text` field.
    pub fn clean(&self) -> Result<(), BlockValidationError> {
        let mut errors = BlockValidationError::new();

        if self.image.is_some() && self.image_alt_text.trim().is_empty() {
            errors.add("image_alt_text", "Must have image alt text with an image");
        }

        errors.into_result()
    }
}

/// Internal reference to another page in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRefBlock {
    pub target: PageId,
}

/// Plain paragraph text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphBlock {
    pub text: String,
}

/// Field-scoped validation failure for a block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockValidationError {
    errors: BTreeMap<String, Vec<String>>,
}

impl BlockValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    /// Messages recorded against a field, if any.
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_result(self) -> Result<(), BlockValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for BlockValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation errors in block:")?;
        for (field, messages) in &self.errors {
            write!(f, " {}: {};", field, messages.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for BlockValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_without_alt_text_fails() {
        let block = ImageBlock {
            image: Some(7),
            image_alt_text: "".to_string(),
            image_caption: "".to_string(),
        };

        let err = block.clean().expect_err("Should fail validation");
        let messages = err.field("image_alt_text").expect("error keyed to field");
        assert!(messages[0].contains("alt text"));
    }

    #[test]
    fn test_image_with_alt_text_passes() {
        let block = ImageBlock {
            image: Some(7),
            image_alt_text: "a cat".to_string(),
            image_caption: "".to_string(),
        };
        assert!(block.clean().is_ok());
    }

    #[test]
    fn test_whitespace_alt_text_fails() {
        let block = ImageBlock {
            image: Some(7),
            image_alt_text: "   ".to_string(),
            image_caption: "".to_string(),
        };
        assert!(block.clean().is_err());
    }

    #[test]
    fn test_no_image_needs_no_alt_text() {
        let block = ImageBlock::default();
        assert!(block.clean().is_ok());
    }

    #[test]
    fn test_stream_field_clean_reports_bad_block() {
        let mut field = StreamField::new();
        field.push(Block::Paragraph(ParagraphBlock {
            text: "hello".to_string(),
        }));
        field.push(Block::Image(ImageBlock {
            image: Some(1),
            ..ImageBlock::default()
        }));

        let err = field.clean().expect_err("Should fail on the image block");
        assert!(err.field("image_alt_text").is_some());
    }

    #[test]
    fn test_stream_field_serde_roundtrip() {
        let mut field = StreamField::new();
        field.push(Block::PageRef(PageRefBlock { target: 42 }));
        field.push(Block::Image(ImageBlock {
            image: Some(3),
            image_alt_text: "logo".to_string(),
            image_caption: "the logo".to_string(),
        }));

        let json = serde_json::to_string(&field).expect("serialize");
        assert!(json.contains("\"type\":\"page_ref\""));

        let restored: StreamField = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(field, restored);
    }

    #[test]
    fn test_display_names_field() {
        let block = ImageBlock {
            image: Some(1),
            ..ImageBlock::default()
        };
        let err = block.clean().unwrap_err();
        assert!(err.to_string().contains("image_alt_text"));
    }
}
