//! Attachment cardinality rules.
//!
//! The validator does not decide how many attachments a request may carry;
//! the call site injects an [`AttachmentRule`] through
//! [`Expectations`](crate::Expectations).

/// What a multipart request turned out to contain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormShape {
    pub attachments: usize,
    /// Whether the JSON side-channel field was present and non-blank.
    pub has_metadata: bool,
}

/// Predicate over a request's shape. A failure message is reported against
/// the file field.
pub trait AttachmentRule: Send + Sync {
    fn check(&self, shape: &FormShape) -> Result<(), String>;
}

impl<F> AttachmentRule for F
where
    F: Fn(&FormShape) -> Result<(), String> + Send + Sync,
{
    fn check(&self, shape: &FormShape) -> Result<(), String> {
        self(shape)
    }
}

/// Used on create.
pub fn exactly_one_with_metadata(shape: &FormShape) -> Result<(), String> {
    if shape.attachments == 1 && shape.has_metadata {
        Ok(())
    } else {
        Err("expecting one attachment with metadata".to_string())
    }
}

/// Used on update.
pub fn at_most_one_and_or_metadata(shape: &FormShape) -> Result<(), String> {
    if shape.attachments <= 1 && (shape.attachments == 1 || shape.has_metadata) {
        Ok(())
    } else {
        Err("no attachment (max one) or metadata present".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, false, false, false)]
    #[case(0, true, false, true)]
    #[case(1, false, false, true)]
    #[case(1, true, true, true)]
    #[case(2, true, false, false)]
    fn test_rules(
        #[case] attachments: usize,
        #[case] has_metadata: bool,
        #[case] create_ok: bool,
        #[case] update_ok: bool,
    ) {
        let shape = FormShape { attachments, has_metadata };
        assert_eq!(exactly_one_with_metadata(&shape).is_ok(), create_ok);
        assert_eq!(at_most_one_and_or_metadata(&shape).is_ok(), update_ok);
    }

    #[test]
    fn test_closures_are_rules() {
        let metadata_only = |shape: &FormShape| match shape.attachments {
            0 => Ok(()),
            _ => Err("attachments are not accepted here".to_string()),
        };
        let rule: Box<dyn AttachmentRule> = Box::new(metadata_only);
        assert!(rule.check(&FormShape { attachments: 0, has_metadata: true }).is_ok());
        assert!(rule.check(&FormShape { attachments: 1, has_metadata: true }).is_err());
    }
}
