//! Block Graph
//!
//! The designer serializes its visual program as Blockly workspace JSON.
//! This module parses that loose shape into a closed sum type so every
//! consumer (code generator, native lowering, validation) matches block
//! kinds exhaustively.
//!
//! ## Invariants
//!
//! 1. The graph is immutable after parsing.
//! 2. An unknown `type` tag is a structural error naming the block id.
//! 3. Statement slots and top-level stacks keep document order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::errors::GenerateError;

// ═══════════════════════════════════════════════════════════════════════════════
// RAW WORKSPACE JSON
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub fields: IndexMap<String, Value>,
    #[serde(default)]
    pub inputs: IndexMap<String, RawInput>,
    #[serde(default)]
    pub next: Option<RawInput>,
    #[serde(default)]
    pub extra_state: Option<Value>,
}

/// A connection slot. Blockly stores a default shadow block next to the
/// real one; the real block wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawInput {
    #[serde(default)]
    pub block: Option<Box<RawBlock>>,
    #[serde(default)]
    pub shadow: Option<Box<RawBlock>>,
}

impl RawInput {
    fn connected(&self) -> Option<&RawBlock> {
        self.block.as_deref().or(self.shadow.as_deref())
    }
}

impl RawBlock {
    fn input(&self, name: &str) -> Option<&RawBlock> {
        self.inputs.get(name).and_then(RawInput::connected)
    }

    fn next_block(&self) -> Option<&RawBlock> {
        self.next.as_ref().and_then(RawInput::connected)
    }

    fn text_field(&self, name: &str) -> String {
        match self.fields.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    PidRecord,
    PidRecordSkipable,
    AttributeKey,
    ProfileHmc,
    ProfileHmcReference,
    BacklinkDeclaration,
    InputJsonPointer,
    InputJsonPath,
    InputCustomJsonPath,
    InputCustomJson,
    InputCustomJsonPointer,
    StopDesign,
    LogValue,
    Otherwise,
    ListsCreateWith,
    Text,
    MathNumber,
    LogicBoolean,
    LogicNull,
}

impl BlockType {
    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "pidrecord" => Self::PidRecord,
            "pidrecord_skipable" => Self::PidRecordSkipable,
            "attribute_key" => Self::AttributeKey,
            "profile_hmc" => Self::ProfileHmc,
            "profile_hmc_reference_block" => Self::ProfileHmcReference,
            "backlink_declaration" => Self::BacklinkDeclaration,
            "input_json_pointer" => Self::InputJsonPointer,
            "input_jsonpath" => Self::InputJsonPath,
            "input_custom_json_path" => Self::InputCustomJsonPath,
            "input_custom_json" => Self::InputCustomJson,
            "input_custom_json_pointer" => Self::InputCustomJsonPointer,
            "stop_design" => Self::StopDesign,
            "log_value" => Self::LogValue,
            "otherwise" => Self::Otherwise,
            "lists_create_with" => Self::ListsCreateWith,
            "text" => Self::Text,
            "math_number" => Self::MathNumber,
            "logic_boolean" => Self::LogicBoolean,
            "logic_null" => Self::LogicNull,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PidRecord => "pidrecord",
            Self::PidRecordSkipable => "pidrecord_skipable",
            Self::AttributeKey => "attribute_key",
            Self::ProfileHmc => "profile_hmc",
            Self::ProfileHmcReference => "profile_hmc_reference_block",
            Self::BacklinkDeclaration => "backlink_declaration",
            Self::InputJsonPointer => "input_json_pointer",
            Self::InputJsonPath => "input_jsonpath",
            Self::InputCustomJsonPath => "input_custom_json_path",
            Self::InputCustomJson => "input_custom_json",
            Self::InputCustomJsonPointer => "input_custom_json_pointer",
            Self::StopDesign => "stop_design",
            Self::LogValue => "log_value",
            Self::Otherwise => "otherwise",
            Self::ListsCreateWith => "lists_create_with",
            Self::Text => "text",
            Self::MathNumber => "math_number",
            Self::LogicBoolean => "logic_boolean",
            Self::LogicNull => "logic_null",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROFILE CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileProperty {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub identifier: String,
}

/// Profile metadata a profile block carries in its `extraState`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDescriptor {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attribute_key: Option<String>,
    #[serde(default)]
    pub properties: Vec<ProfileProperty>,
}

impl ProfileDescriptor {
    /// The attribute under which a record references its profile: the
    /// explicit `attributeKey`, else the PID of the first property whose
    /// name mentions "profile".
    pub fn attribute_key(&self) -> Option<&str> {
        if let Some(key) = self.attribute_key.as_deref().filter(|k| !k.is_empty()) {
            return Some(key);
        }
        self.properties
            .iter()
            .find(|p| p.name.to_lowercase().contains("profile"))
            .map(|p| p.identifier.as_str())
            .filter(|pid| !pid.is_empty())
    }

    /// Resolves a block input name to a property PID. Inputs may carry a
    /// suffix (`topic2`), so an exact name wins over the longest prefix.
    pub fn pid_for_input(&self, input: &str) -> Option<&str> {
        let exact = self.properties.iter().find(|p| p.name == input);
        let matched = exact.or_else(|| {
            self.properties
                .iter()
                .filter(|p| !p.name.is_empty() && input.starts_with(p.name.as_str()))
                .max_by_key(|p| p.name.len())
        });
        matched
            .map(|p| p.identifier.as_str())
            .filter(|pid| !pid.is_empty())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED BLOCKS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Record(RecordBlock),
    Attribute(AttributeBlock),
    Profile(ProfileBlock),
    Input(InputBlock),
    Control(ControlBlock),
    Backlink(BacklinkBlock),
    AttributeReference(AttributeReferenceBlock),
    Literal(LiteralBlock),
    List(ListBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordBlock {
    pub id: String,
    pub block_type: BlockType,
    pub local_id: Option<Box<Block>>,
    /// Only present on `pidrecord_skipable`.
    pub skip_condition: Option<Box<Block>>,
    pub body: Vec<Block>,
}

impl RecordBlock {
    pub fn is_skippable(&self) -> bool {
        self.block_type == BlockType::PidRecordSkipable
    }

    /// Records only stand at the top level; one chained into another
    /// record's body is a malformed graph.
    pub fn reject_nested_records(&self) -> Result<(), GenerateError> {
        match self.body.iter().find(|block| matches!(block, Block::Record(_))) {
            Some(inner) => Err(GenerateError::MalformedGraph(format!(
                "Record block '{}' is nested inside record '{}'",
                inner.id(),
                self.id
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBlock {
    pub id: String,
    pub key: Option<Box<Block>>,
    pub value: Option<Box<Block>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileInput {
    pub name: String,
    pub value: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileBlock {
    pub id: String,
    pub descriptor: Option<ProfileDescriptor>,
    /// Connected property inputs in slot order.
    pub inputs: Vec<ProfileInput>,
}

impl ProfileBlock {
    /// Checks the profile contract and returns the descriptor together with
    /// the self-reference attribute key.
    pub fn contract(&self) -> Result<(&ProfileDescriptor, &str), GenerateError> {
        let incomplete = |missing: &str| GenerateError::IncompleteProfile {
            block_id: self.id.clone(),
            missing: missing.to_string(),
        };
        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or_else(|| incomplete("no profile descriptor"))?;
        if descriptor.identifier.trim().is_empty() {
            return Err(incomplete("empty profile identifier"));
        }
        let key = descriptor
            .attribute_key()
            .ok_or_else(|| incomplete("no attribute key for the profile reference"))?;
        Ok((descriptor, key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryLanguage {
    JsonPointer,
    JsonPath,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    /// Typed into the block's own field.
    Field(String),
    /// Computed by the block connected to `QUERY`.
    Slot(Option<Box<Block>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputBlock {
    pub id: String,
    pub block_type: BlockType,
    pub language: QueryLanguage,
    pub query: QuerySource,
}

impl InputBlock {
    /// The query text when it is statically known.
    pub fn literal_query(&self) -> Option<&str> {
        match &self.query {
            QuerySource::Field(query) => Some(query.as_str()),
            QuerySource::Slot(Some(block)) => match block.as_ref() {
                Block::Literal(LiteralBlock {
                    value: Literal::Text(text),
                    ..
                }) => Some(text.as_str()),
                _ => None,
            },
            QuerySource::Slot(None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Stop {
        message: Option<Box<Block>>,
    },
    Log {
        description: String,
        value: Option<Box<Block>>,
    },
    Otherwise {
        value: Option<Box<Block>>,
        other: Option<Box<Block>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlBlock {
    pub id: String,
    pub kind: ControlKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacklinkBlock {
    pub id: String,
    pub attribute_key: Option<Box<Block>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeReferenceBlock {
    pub id: String,
    pub pid: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl Literal {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Null => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralBlock {
    pub id: String,
    pub block_type: BlockType,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListBlock {
    pub id: String,
    /// Connected items in slot order.
    pub items: Vec<Block>,
}

impl Block {
    pub fn id(&self) -> &str {
        match self {
            Self::Record(b) => &b.id,
            Self::Attribute(b) => &b.id,
            Self::Profile(b) => &b.id,
            Self::Input(b) => &b.id,
            Self::Control(b) => &b.id,
            Self::Backlink(b) => &b.id,
            Self::AttributeReference(b) => &b.id,
            Self::Literal(b) => &b.id,
            Self::List(b) => &b.id,
        }
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Record(b) => b.block_type,
            Self::Attribute(_) => BlockType::AttributeKey,
            Self::Profile(_) => BlockType::ProfileHmc,
            Self::Input(b) => b.block_type,
            Self::Control(b) => match b.kind {
                ControlKind::Stop { .. } => BlockType::StopDesign,
                ControlKind::Log { .. } => BlockType::LogValue,
                ControlKind::Otherwise { .. } => BlockType::Otherwise,
            },
            Self::Backlink(_) => BlockType::BacklinkDeclaration,
            Self::AttributeReference(_) => BlockType::ProfileHmcReference,
            Self::Literal(b) => b.block_type,
            Self::List(_) => BlockType::ListsCreateWith,
        }
    }

    /// Statement blocks live in statement slots; everything else is a value.
    pub fn is_statement(&self) -> bool {
        matches!(self, Self::Record(_) | Self::Attribute(_) | Self::Profile(_))
    }

    pub fn from_raw(raw: &RawBlock) -> Result<Self, GenerateError> {
        let block_type =
            BlockType::parse(&raw.block_type).ok_or_else(|| GenerateError::UnknownBlockType {
                block_id: raw.id.clone(),
                block_type: raw.block_type.clone(),
            })?;
        let id = raw.id.clone();
        let slot = |name: &str| -> Result<Option<Box<Block>>, GenerateError> {
            raw.input(name)
                .map(|child| Block::from_raw(child).map(Box::new))
                .transpose()
        };

        Ok(match block_type {
            BlockType::PidRecord | BlockType::PidRecordSkipable => Self::Record(RecordBlock {
                id,
                block_type,
                local_id: slot("local-id")?,
                skip_condition: if block_type == BlockType::PidRecordSkipable {
                    slot("skip-condition")?
                } else {
                    None
                },
                body: match raw.input("record") {
                    Some(first) => statement_chain(first)?,
                    None => Vec::new(),
                },
            }),
            BlockType::AttributeKey => Self::Attribute(AttributeBlock {
                id,
                key: slot("KEY")?,
                value: slot("VALUE")?,
            }),
            BlockType::ProfileHmc => {
                let descriptor = match raw.extra_state.as_ref().and_then(|s| s.get("profile")) {
                    Some(profile) => Some(
                        serde_json::from_value::<ProfileDescriptor>(profile.clone()).map_err(
                            |e| {
                                GenerateError::MalformedGraph(format!(
                                    "Block '{}' has an unreadable profile descriptor: {}",
                                    raw.id, e
                                ))
                            },
                        )?,
                    ),
                    None => None,
                };
                let mut inputs = Vec::new();
                for (name, input) in &raw.inputs {
                    if let Some(child) = input.connected() {
                        inputs.push(ProfileInput {
                            name: name.clone(),
                            value: Block::from_raw(child)?,
                        });
                    }
                }
                Self::Profile(ProfileBlock {
                    id,
                    descriptor,
                    inputs,
                })
            }
            BlockType::ProfileHmcReference => Self::AttributeReference(AttributeReferenceBlock {
                id,
                pid: raw.text_field("ATTRIBUTE"),
            }),
            BlockType::BacklinkDeclaration => Self::Backlink(BacklinkBlock {
                id,
                attribute_key: slot("ATTRIBUTE_KEY")?,
            }),
            BlockType::InputJsonPointer | BlockType::InputJsonPath => Self::Input(InputBlock {
                id,
                block_type,
                language: QueryLanguage::JsonPointer,
                query: QuerySource::Field(raw.text_field("QUERY")),
            }),
            BlockType::InputCustomJsonPath | BlockType::InputCustomJson => {
                Self::Input(InputBlock {
                    id,
                    block_type,
                    language: QueryLanguage::JsonPath,
                    query: QuerySource::Slot(slot("QUERY")?),
                })
            }
            BlockType::InputCustomJsonPointer => Self::Input(InputBlock {
                id,
                block_type,
                language: QueryLanguage::JsonPointer,
                query: QuerySource::Slot(slot("QUERY")?),
            }),
            BlockType::StopDesign => Self::Control(ControlBlock {
                id,
                kind: ControlKind::Stop {
                    message: slot("MESSAGE")?,
                },
            }),
            BlockType::LogValue => Self::Control(ControlBlock {
                id,
                kind: ControlKind::Log {
                    description: raw.text_field("DESC"),
                    value: slot("INVAR")?,
                },
            }),
            BlockType::Otherwise => Self::Control(ControlBlock {
                id,
                kind: ControlKind::Otherwise {
                    value: slot("VALUE")?,
                    other: slot("OTHER")?,
                },
            }),
            BlockType::ListsCreateWith => {
                let mut items = Vec::new();
                for (name, input) in &raw.inputs {
                    if !name.starts_with("ADD") {
                        continue;
                    }
                    if let Some(child) = input.connected() {
                        items.push(Block::from_raw(child)?);
                    }
                }
                Self::List(ListBlock { id, items })
            }
            BlockType::Text => Self::Literal(LiteralBlock {
                id,
                block_type,
                value: Literal::Text(raw.text_field("TEXT")),
            }),
            BlockType::MathNumber => {
                let value = parse_number(raw.fields.get("NUM")).ok_or_else(|| {
                    GenerateError::MalformedGraph(format!(
                        "Block '{}' has an invalid number field",
                        raw.id
                    ))
                })?;
                Self::Literal(LiteralBlock {
                    id,
                    block_type,
                    value: Literal::Number(value),
                })
            }
            BlockType::LogicBoolean => Self::Literal(LiteralBlock {
                id,
                block_type,
                value: Literal::Bool(raw.text_field("BOOL").eq_ignore_ascii_case("TRUE")),
            }),
            BlockType::LogicNull => Self::Literal(LiteralBlock {
                id,
                block_type,
                value: Literal::Null,
            }),
        })
    }
}

fn parse_number(field: Option<&Value>) -> Option<Number> {
    match field {
        Some(Value::Number(n)) => Some(n.clone()),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Number::from)
                .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64))
        }
        None => Some(Number::from(0)),
        _ => None,
    }
}

fn statement_chain(first: &RawBlock) -> Result<Vec<Block>, GenerateError> {
    let mut chain = Vec::new();
    let mut current = Some(first);
    while let Some(raw) = current {
        chain.push(Block::from_raw(raw)?);
        current = raw.next_block();
    }
    Ok(chain)
}

// ═══════════════════════════════════════════════════════════════════════════════
// GRAPH
// ═══════════════════════════════════════════════════════════════════════════════

/// A top-level block with the blocks chained below it.
pub type BlockStack = Vec<Block>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockGraph {
    pub stacks: Vec<BlockStack>,
}

impl BlockGraph {
    /// Accepts a full workspace (`{"blocks": {"blocks": [...]}}`), a bare
    /// `{"blocks": [...]}` object or a bare array of top-level blocks.
    pub fn from_json(workspace: &Value) -> Result<Self, GenerateError> {
        let top = match workspace {
            Value::Array(blocks) => blocks,
            Value::Object(map) => match map.get("blocks") {
                Some(Value::Array(blocks)) => blocks,
                Some(Value::Object(inner)) => match inner.get("blocks") {
                    Some(Value::Array(blocks)) => blocks,
                    None => return Ok(Self::default()),
                    Some(_) => {
                        return Err(GenerateError::MalformedGraph(
                            "'blocks.blocks' must be an array".to_string(),
                        ))
                    }
                },
                None => return Ok(Self::default()),
                Some(_) => {
                    return Err(GenerateError::MalformedGraph(
                        "'blocks' must be an object or an array".to_string(),
                    ))
                }
            },
            _ => {
                return Err(GenerateError::MalformedGraph(
                    "Workspace must be an object or an array".to_string(),
                ))
            }
        };

        let mut stacks = Vec::with_capacity(top.len());
        for value in top {
            let raw: RawBlock = serde_json::from_value(value.clone())
                .map_err(|e| GenerateError::MalformedGraph(e.to_string()))?;
            stacks.push(statement_chain(&raw)?);
        }
        Ok(Self { stacks })
    }

    pub fn from_json_str(workspace: &str) -> Result<Self, GenerateError> {
        let value: Value = serde_json::from_str(workspace)
            .map_err(|e| GenerateError::MalformedGraph(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Top-level blocks and their chains, flattened in document order.
    pub fn top_level(&self) -> impl Iterator<Item = &Block> {
        self.stacks.iter().flatten()
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordBlock> {
        self.top_level().filter_map(|block| match block {
            Block::Record(record) => Some(record),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}
