use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use interactives_models::{Interactive, State};
use time::OffsetDateTime;

#[derive(sqlx::FromRow)]
pub(crate) struct InteractiveRow {
    pub id: String,
    pub sha: String,
    pub title: String,
    pub resource_id: String,
    pub collection_id: Option<String>,
    pub state: String,
    pub active: bool,
    pub published: bool,
    pub document: String,
    pub last_updated: i64,
}
impl TryFrom<&Interactive> for InteractiveRow {
    type Error = Error;
    fn try_from(interactive: &Interactive) -> Result<Self, Self::Error> {
        let last_updated = interactive.last_updated.unwrap_or_else(OffsetDateTime::now_utc);
        Ok(Self {
            id: interactive.id.clone(),
            sha: interactive.sha.clone(),
            title: interactive.metadata.title.clone(),
            resource_id: interactive.metadata.resource_id.clone(),
            collection_id: interactive.metadata.collection_id.clone(),
            state: interactive.state.to_string(),
            active: interactive.active,
            published: interactive.published,
            document: serde_json::to_string(interactive).or_raise(|| ErrorKind::InvalidData("document"))?,
            last_updated: last_updated.unix_timestamp(),
        })
    }
}
impl TryFrom<InteractiveRow> for Interactive {
    type Error = Error;
    fn try_from(row: InteractiveRow) -> Result<Self, Self::Error> {
        let mut interactive: Interactive =
            serde_json::from_str(&row.document).or_raise(|| ErrorKind::InvalidData("document"))?;
        // Indexed columns are authoritative over the document copy.
        interactive.id = row.id;
        interactive.sha = row.sha;
        interactive.metadata.title = row.title;
        interactive.metadata.resource_id = row.resource_id;
        interactive.metadata.collection_id = row.collection_id;
        interactive.state = row.state.parse::<State>().or_raise(|| ErrorKind::InvalidData("state"))?;
        interactive.active = row.active;
        interactive.published = row.published;
        interactive.last_updated = Some(
            OffsetDateTime::from_unix_timestamp(row.last_updated).or_raise(|| ErrorKind::InvalidData("last updated"))?,
        );
        Ok(interactive)
    }
}
