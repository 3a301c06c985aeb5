use vcat_core::ImportSettings;

/// Per-window inputs shared by the classifier, writer, synthesizer and
/// price-list rebuilder.
#[derive(Debug, Clone, Copy)]
pub struct ImportContext<'a> {
    pub settings: &'a ImportSettings,
    /// Attachment every row written in this window is tagged with.
    pub attachment_id: i64,
    /// Id of the attribute variant sizes are recorded under.
    pub size_attribute_id: i64,
}
