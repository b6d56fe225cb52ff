//! Card model, patches and pushed rows.
//!
//! A [`Card`] is the locally materialized row. A [`CardPatch`] is a partial
//! update where `None` means "leave alone". A [`RemoteCard`] is what the
//! push channel delivers: every field but the id may be missing, and a
//! missing field is treated as "no change", never as a reset.

use corkboard_geometry::LogicalPoint;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Stable card identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random 128-bit id, hex encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Owning board identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(String);

impl BoardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BoardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single mutable card field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    X,
    Y,
    Collapsed,
    Title,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::X, Field::Y, Field::Collapsed, Field::Title];

    /// The group this field is written with.
    pub const fn group(self) -> FieldGroup {
        match self {
            Field::X | Field::Y => FieldGroup::Position,
            Field::Collapsed => FieldGroup::Collapse,
            Field::Title => FieldGroup::Content,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::X => write!(f, "x"),
            Field::Y => write!(f, "y"),
            Field::Collapsed => write!(f, "isCollapsed"),
            Field::Title => write!(f, "title"),
        }
    }
}

/// Fields that are always written together by one gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Position,
    Collapse,
    Content,
}

impl FieldGroup {
    pub const fn fields(self) -> &'static [Field] {
        match self {
            FieldGroup::Position => &[Field::X, Field::Y],
            FieldGroup::Collapse => &[Field::Collapsed],
            FieldGroup::Content => &[Field::Title],
        }
    }
}

/// The value of one field, used for pending-write bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    X(i32),
    Y(i32),
    Collapsed(bool),
    Title(String),
}

impl FieldValue {
    pub const fn field(&self) -> Field {
        match self {
            FieldValue::X(_) => Field::X,
            FieldValue::Y(_) => Field::Y,
            FieldValue::Collapsed(_) => Field::Collapsed,
            FieldValue::Title(_) => Field::Title,
        }
    }
}

/// An idea card. `x`/`y` is the logical center, whatever the collapse state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub board_id: BoardId,
    pub x: i32,
    pub y: i32,
    pub is_collapsed: bool,
    #[serde(default)]
    pub title: String,
}

impl Card {
    /// A new, expanded card centered at `(x, y)`.
    pub fn new(id: CardId, board_id: BoardId, x: i32, y: i32) -> Self {
        Self {
            id,
            board_id,
            x,
            y,
            is_collapsed: false,
            title: String::new(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn collapsed(mut self, is_collapsed: bool) -> Self {
        self.is_collapsed = is_collapsed;
        self
    }

    pub const fn position(&self) -> LogicalPoint {
        LogicalPoint::new(self.x, self.y)
    }

    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::X => FieldValue::X(self.x),
            Field::Y => FieldValue::Y(self.y),
            Field::Collapsed => FieldValue::Collapsed(self.is_collapsed),
            Field::Title => FieldValue::Title(self.title.clone()),
        }
    }

    /// Set one field. Returns `true` if the value changed.
    pub fn set(&mut self, value: FieldValue) -> bool {
        match value {
            FieldValue::X(x) => std::mem::replace(&mut self.x, x) != x,
            FieldValue::Y(y) => std::mem::replace(&mut self.y, y) != y,
            FieldValue::Collapsed(c) => std::mem::replace(&mut self.is_collapsed, c) != c,
            FieldValue::Title(t) => {
                if self.title == t {
                    false
                } else {
                    self.title = t;
                    true
                }
            }
        }
    }
}

/// A partial card update.
///
/// `board_id` is only consulted when the patch creates a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<BoardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_collapsed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CardPatch {
    /// Patch that moves a card.
    pub fn position(point: LogicalPoint) -> Self {
        Self {
            x: Some(point.x),
            y: Some(point.y),
            ..Self::default()
        }
    }

    /// Patch that sets the collapse state.
    pub fn collapsed(is_collapsed: bool) -> Self {
        Self {
            is_collapsed: Some(is_collapsed),
            ..Self::default()
        }
    }

    /// Patch that sets the title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Patch carrying every field of `card`, suitable for creating the row.
    pub fn full(card: &Card) -> Self {
        Self {
            board_id: Some(card.board_id.clone()),
            x: Some(card.x),
            y: Some(card.y),
            is_collapsed: Some(card.is_collapsed),
            title: Some(card.title.clone()),
        }
    }

    #[must_use]
    pub fn with_position(mut self, point: LogicalPoint) -> Self {
        self.x = Some(point.x);
        self.y = Some(point.y);
        self
    }

    /// Field values present in the patch.
    pub fn values(&self) -> Vec<FieldValue> {
        let mut values = Vec::with_capacity(4);
        if let Some(x) = self.x {
            values.push(FieldValue::X(x));
        }
        if let Some(y) = self.y {
            values.push(FieldValue::Y(y));
        }
        if let Some(c) = self.is_collapsed {
            values.push(FieldValue::Collapsed(c));
        }
        if let Some(t) = &self.title {
            values.push(FieldValue::Title(t.clone()));
        }
        values
    }

    /// Fields present in the patch.
    pub fn fields(&self) -> Vec<Field> {
        self.values().iter().map(FieldValue::field).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.is_collapsed.is_none() && self.title.is_none()
    }

    /// Apply to a card. Returns `true` if anything changed.
    pub fn apply_to(&self, card: &mut Card) -> bool {
        let mut changed = false;
        for value in self.values() {
            changed |= card.set(value);
        }
        changed
    }

    /// Build a new card from a patch; needs at least a position.
    pub fn into_card(self, id: CardId, board_id: BoardId) -> Option<Card> {
        Some(Card {
            id,
            board_id: self.board_id.unwrap_or(board_id),
            x: self.x?,
            y: self.y?,
            is_collapsed: self.is_collapsed.unwrap_or(false),
            title: self.title.unwrap_or_default(),
        })
    }
}

impl FromIterator<FieldValue> for CardPatch {
    fn from_iter<I: IntoIterator<Item = FieldValue>>(values: I) -> Self {
        let mut patch = Self::default();
        for value in values {
            match value {
                FieldValue::X(x) => patch.x = Some(x),
                FieldValue::Y(y) => patch.y = Some(y),
                FieldValue::Collapsed(c) => patch.is_collapsed = Some(c),
                FieldValue::Title(t) => patch.title = Some(t),
            }
        }
        patch
    }
}

/// A card row as delivered by the push channel.
///
/// Missing fields mean "no change" for a card the cache already has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCard {
    pub id: CardId,
    #[serde(default)]
    pub board_id: Option<BoardId>,
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub is_collapsed: Option<bool>,
    #[serde(default)]
    pub title: Option<String>,
}

impl RemoteCard {
    /// Field values present in the row.
    pub fn values(&self) -> Vec<FieldValue> {
        let mut values = Vec::with_capacity(4);
        if let Some(x) = self.x {
            values.push(FieldValue::X(x));
        }
        if let Some(y) = self.y {
            values.push(FieldValue::Y(y));
        }
        if let Some(c) = self.is_collapsed {
            values.push(FieldValue::Collapsed(c));
        }
        if let Some(t) = &self.title {
            values.push(FieldValue::Title(t.clone()));
        }
        values
    }

    /// Materialize a card the cache has not seen. A row without a position
    /// cannot be placed and yields `None`.
    pub fn into_card(self, board_id: &BoardId) -> Option<Card> {
        Some(Card {
            id: self.id,
            board_id: self.board_id.unwrap_or_else(|| board_id.clone()),
            x: self.x?,
            y: self.y?,
            is_collapsed: self.is_collapsed.unwrap_or(false),
            title: self.title.unwrap_or_default(),
        })
    }
}

impl From<Card> for RemoteCard {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            board_id: Some(card.board_id),
            x: Some(card.x),
            y: Some(card.y),
            is_collapsed: Some(card.is_collapsed),
            title: Some(card.title),
        }
    }
}

/// A change pushed by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteEvent {
    /// The full current set of cards for the board.
    Snapshot {
        board_id: BoardId,
        cards: Vec<RemoteCard>,
    },
    /// Some rows changed; cards not listed are untouched.
    Upsert {
        board_id: BoardId,
        cards: Vec<RemoteCard>,
    },
    /// Rows deleted by someone.
    Removed { board_id: BoardId, ids: Vec<CardId> },
}

impl RemoteEvent {
    pub fn board_id(&self) -> &BoardId {
        match self {
            RemoteEvent::Snapshot { board_id, .. }
            | RemoteEvent::Upsert { board_id, .. }
            | RemoteEvent::Removed { board_id, .. } => board_id,
        }
    }

    /// Full snapshot built from materialized cards.
    pub fn snapshot(board_id: BoardId, cards: impl IntoIterator<Item = Card>) -> Self {
        RemoteEvent::Snapshot {
            board_id,
            cards: cards.into_iter().map(RemoteCard::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> Card {
        Card::new("c1".into(), "b1".into(), 300, 200).collapsed(true)
    }

    #[test]
    fn generated_ids_are_unique_hex() {
        let a = CardId::generate();
        let b = CardId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn field_groups() {
        assert_eq!(Field::X.group(), FieldGroup::Position);
        assert_eq!(Field::Y.group(), FieldGroup::Position);
        assert_eq!(Field::Collapsed.group(), FieldGroup::Collapse);
        for group in [FieldGroup::Position, FieldGroup::Collapse, FieldGroup::Content] {
            for field in group.fields() {
                assert_eq!(field.group(), group);
            }
        }
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut c = card();
        let patch = CardPatch::collapsed(false);
        assert_eq!(patch.fields(), vec![Field::Collapsed]);
        assert!(patch.apply_to(&mut c));
        assert_eq!((c.x, c.y, c.is_collapsed), (300, 200, false));
        assert!(!patch.apply_to(&mut c));
    }

    #[test]
    fn card_serializes_with_wire_names() {
        let json = serde_json::to_value(card()).unwrap();
        assert_eq!(json["isCollapsed"], true);
        assert_eq!(json["boardId"], "b1");
    }

    #[test]
    fn partial_remote_row_deserializes() {
        let row: RemoteCard = serde_json::from_str(r#"{"id":"c1","x":12}"#).unwrap();
        assert_eq!(row.x, Some(12));
        assert_eq!(row.y, None);
        assert_eq!(row.is_collapsed, None);
        assert_eq!(row.values(), vec![FieldValue::X(12)]);
        // No position on both axes: cannot be placed as a new card.
        assert!(row.into_card(&"b1".into()).is_none());
    }

    #[test]
    fn remote_event_tagging() {
        let event = RemoteEvent::snapshot("b1".into(), vec![card()]);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"snapshot""#));
        let parsed: RemoteEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.board_id(), &BoardId::new("b1"));
    }

    #[test]
    fn full_patch_creates_equal_card() {
        let c = card().with_title("idea");
        let built = CardPatch::full(&c)
            .into_card(c.id.clone(), "other".into())
            .unwrap();
        assert_eq!(built, c);
    }
}
