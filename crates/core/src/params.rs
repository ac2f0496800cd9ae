//! Typed parameter trees.
//!
//! Every configurable thing in a run (algorithm parameters, task-runner
//! settings, NWB export settings) is described by the same tree shape:
//! named leaves carrying a typed value, and named groups nesting further
//! trees. Canonical trees are built from static [`ParamDecl`] lists; stored
//! trees (from the UI or from run files) are merged onto them.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A parameter tree: name -> leaf or group.
pub type ParamTree = IndexMap<String, ParamNode>;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Declared type of a leaf value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Str => "str",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Bool => "bool",
            DataType::List => "list",
            DataType::Dict => "dict",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "str" => Some(DataType::Str),
            "int" => Some(DataType::Int),
            "float" => Some(DataType::Float),
            "bool" => Some(DataType::Bool),
            "list" => Some(DataType::List),
            "dict" => Some(DataType::Dict),
            _ => None,
        }
    }
}

/// Stored trees may carry type tags we do not model (unions written as a
/// list of names, `NoneType`, ...). Those read as "undeclared" instead of
/// failing the whole document.
fn lenient_data_type<'de, D>(deserializer: D) -> Result<Option<DataType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => DataType::parse(&s),
        Some(Value::Array(items)) => items
            .first()
            .and_then(Value::as_str)
            .and_then(DataType::parse),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Tree nodes
// ---------------------------------------------------------------------------

/// A leaf parameter.
///
/// Only `value` is meaningful in stored trees; `path`, `dataType` and `doc`
/// come from the canonical declaration and are restored by
/// [`merge_params`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamChild {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub value: Value,
    #[serde(
        rename = "dataType",
        default,
        deserialize_with = "lenient_data_type"
    )]
    pub data_type: Option<DataType>,
    #[serde(default)]
    pub doc: Option<String>,
}

impl ParamChild {
    /// A bare leaf holding only a value, as produced by the legacy format.
    pub fn bare(value: Value) -> Self {
        Self {
            path: String::new(),
            value,
            data_type: None,
            doc: None,
        }
    }
}

/// A parameter group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamParent {
    #[serde(default)]
    pub children: ParamTree,
}

/// One entry of a [`ParamTree`], tagged by `type: child | parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamNode {
    Child(ParamChild),
    Parent(ParamParent),
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Static declaration of one parameter, the source of canonical trees.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: &'static str,
    pub data_type: DataType,
    pub default: Value,
    pub doc: Option<&'static str>,
    /// Slash-delimited group path, e.g. `"ophys/plane_segmentation"`.
    pub section: Option<&'static str>,
}

impl ParamDecl {
    pub fn new(name: &'static str, data_type: DataType, default: Value) -> Self {
        Self {
            name,
            data_type,
            default,
            doc: None,
            section: None,
        }
    }

    pub fn str(name: &'static str, default: &str) -> Self {
        Self::new(name, DataType::Str, Value::from(default))
    }

    pub fn int(name: &'static str, default: i64) -> Self {
        Self::new(name, DataType::Int, Value::from(default))
    }

    pub fn float(name: &'static str, default: f64) -> Self {
        Self::new(name, DataType::Float, Value::from(default))
    }

    pub fn bool(name: &'static str, default: bool) -> Self {
        Self::new(name, DataType::Bool, Value::from(default))
    }

    pub fn list(name: &'static str, default: Value) -> Self {
        Self::new(name, DataType::List, default)
    }

    /// A parameter whose default is `None`.
    pub fn none(name: &'static str, data_type: DataType) -> Self {
        Self::new(name, data_type, Value::Null)
    }

    pub fn doc(mut self, doc: &'static str) -> Self {
        self.doc = Some(doc);
        self
    }

    pub fn section(mut self, section: &'static str) -> Self {
        self.section = Some(section);
        self
    }

    /// The canonical leaf for this declaration.
    pub fn to_child(&self) -> ParamChild {
        let path = match self.section {
            Some(section) => format!("{section}/{}", self.name),
            None => self.name.to_string(),
        };
        ParamChild {
            path,
            value: self.default.clone(),
            data_type: Some(self.data_type),
            doc: self.doc.map(str::to_string),
        }
    }

    /// Whether the declared default is `None` (the input is optional).
    pub fn is_none(&self) -> bool {
        self.default.is_null()
    }
}

/// Build the canonical tree for a declaration list, nesting leaves under
/// their `section` groups.
pub fn build_param_tree(decls: &[ParamDecl]) -> ParamTree {
    let mut tree = ParamTree::new();
    for decl in decls {
        let mut current = &mut tree;
        if let Some(section) = decl.section {
            for part in section.split('/') {
                let node = current
                    .entry(part.to_string())
                    .or_insert_with(|| ParamNode::Parent(ParamParent::default()));
                current = group_children(node);
            }
        }
        current.insert(decl.name.to_string(), ParamNode::Child(decl.to_child()));
    }
    tree
}

/// Children of a group node, turning a leaf into an empty group first.
fn group_children(node: &mut ParamNode) -> &mut ParamTree {
    if let ParamNode::Child(_) = node {
        *node = ParamNode::Parent(ParamParent::default());
    }
    match node {
        ParamNode::Parent(group) => &mut group.children,
        ParamNode::Child(_) => unreachable!("leaf replaced by group above"),
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge a stored tree onto a canonical one.
///
/// Walks both trees by key: matching groups recurse, matching leaves take
/// the stored value. Keys only in `destination` keep their defaults; keys
/// only in `source` are dropped, as are entries whose shape (leaf vs group)
/// disagrees with the canonical tree.
pub fn merge_params(source: &ParamTree, mut destination: ParamTree) -> ParamTree {
    merge_into(source, &mut destination);
    destination
}

fn merge_into(source: &ParamTree, destination: &mut ParamTree) {
    for (key, stored) in source {
        let Some(canonical) = destination.get_mut(key) else {
            tracing::debug!(param = %key, "Dropping parameter not present in defaults");
            continue;
        };
        match (stored, canonical) {
            (ParamNode::Parent(stored), ParamNode::Parent(canonical)) => {
                merge_into(&stored.children, &mut canonical.children);
            }
            (ParamNode::Child(stored), ParamNode::Child(canonical)) => {
                canonical.value = stored.value.clone();
            }
            _ => {
                tracing::debug!(param = %key, "Parameter shape differs from defaults, keeping default");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stored format detection / legacy migration
// ---------------------------------------------------------------------------

/// Whether a stored document uses the typed-leaf format.
///
/// Heuristic: the first entry is an object carrying a `type` key. Older
/// documents map names straight to values (or to nested sections).
pub fn is_typed_format(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|map| map.values().next())
        .and_then(Value::as_object)
        .is_some_and(|first| first.contains_key("type"))
}

/// Convert a legacy flat document (`name -> value | {section}`) into a
/// typed tree holding only values.
pub fn from_legacy(value: &Value) -> ParamTree {
    let mut tree = ParamTree::new();
    if let Some(map) = value.as_object() {
        for (key, entry) in map {
            let node = match entry {
                Value::Object(_) => ParamNode::Parent(ParamParent {
                    children: from_legacy(entry),
                }),
                other => ParamNode::Child(ParamChild::bare(other.clone())),
            };
            tree.insert(key.clone(), node);
        }
    }
    tree
}

/// Parse a stored parameter document in either format.
///
/// `null` and empty objects read as an empty tree.
pub fn parse_stored_params(value: &Value) -> Result<ParamTree, serde_json::Error> {
    match value {
        Value::Null => Ok(ParamTree::new()),
        Value::Object(map) if map.is_empty() => Ok(ParamTree::new()),
        typed if is_typed_format(typed) => serde_json::from_value(typed.clone()),
        legacy => Ok(from_legacy(legacy)),
    }
}

/// Serde adapter for fields holding a stored parameter document in either
/// format.
pub fn deserialize_stored<'de, D>(deserializer: D) -> Result<ParamTree, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    parse_stored_params(&raw).map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// Type fix-up
// ---------------------------------------------------------------------------

/// Coerce every leaf value to its declared data type.
///
/// `null` values stay `null`. Values that cannot be converted are kept
/// as-is.
pub fn fix_param_value_type(tree: &mut ParamTree) {
    for (key, node) in tree.iter_mut() {
        match node {
            ParamNode::Parent(group) => fix_param_value_type(&mut group.children),
            ParamNode::Child(child) => {
                let Some(data_type) = child.data_type else {
                    continue;
                };
                if child.value.is_null() {
                    continue;
                }
                match coerce_value(&child.value, data_type) {
                    Some(fixed) => child.value = fixed,
                    None => tracing::warn!(
                        param = %key,
                        data_type = data_type.as_str(),
                        value = %child.value,
                        "Parameter value does not match its declared type"
                    ),
                }
            }
        }
    }
}

fn coerce_value(value: &Value, data_type: DataType) -> Option<Value> {
    match data_type {
        DataType::Str => Some(match value {
            Value::String(_) => value.clone(),
            other => Value::String(other.to_string()),
        }),
        DataType::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .map(Value::from),
            Value::Bool(b) => Some(Value::from(i64::from(*b))),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                    .map(Value::from)
            }
            _ => None,
        },
        DataType::Float => match value {
            Value::Number(n) => n.as_f64().map(Value::from),
            Value::Bool(b) => Some(Value::from(if *b { 1.0 } else { 0.0 })),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Value::from),
            _ => None,
        },
        DataType::Bool => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" | "" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        DataType::List | DataType::Dict => Some(value.clone()),
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// Nested `name -> value` map; groups become nested objects.
pub fn to_key_value(tree: &ParamTree) -> Map<String, Value> {
    tree.iter()
        .map(|(key, node)| {
            let value = match node {
                ParamNode::Child(child) => child.value.clone(),
                ParamNode::Parent(group) => Value::Object(to_key_value(&group.children)),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Collapse nested objects into one level. Later keys win on collision.
pub fn flatten(params: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in params {
        match value {
            Value::Object(inner) => flat.extend(flatten(inner)),
            other => {
                flat.insert(key.clone(), other.clone());
            }
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn leaf(value: Value) -> ParamNode {
        ParamNode::Child(ParamChild {
            path: String::new(),
            value,
            data_type: Some(DataType::Int),
            doc: None,
        })
    }

    fn group(children: Vec<(&str, ParamNode)>) -> ParamNode {
        ParamNode::Parent(ParamParent {
            children: children
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        })
    }

    fn value_at<'a>(tree: &'a ParamTree, path: &[&str]) -> &'a Value {
        let (last, parents) = path.split_last().unwrap();
        let mut current = tree;
        for part in parents {
            match &current[*part] {
                ParamNode::Parent(g) => current = &g.children,
                ParamNode::Child(_) => panic!("{part} is a leaf"),
            }
        }
        match &current[*last] {
            ParamNode::Child(c) => &c.value,
            ParamNode::Parent(_) => panic!("{last} is a group"),
        }
    }

    fn defaults() -> ParamTree {
        let mut tree = ParamTree::new();
        tree.insert("a".into(), leaf(json!(1)));
        tree.insert("b".into(), group(vec![("c", leaf(json!(2)))]));
        tree
    }

    // -- build_param_tree ---------------------------------------------------

    #[test]
    fn build_nests_sections_and_sets_paths() {
        let tree = build_param_tree(&[
            ParamDecl::str("identifier", "studio"),
            ParamDecl::str("name", "PlaneSegmentation").section("ophys/plane_segmentation"),
            ParamDecl::float("imaging_rate", 30.0).section("imaging_plane"),
        ]);

        assert_eq!(value_at(&tree, &["identifier"]), &json!("studio"));
        assert_eq!(
            value_at(&tree, &["ophys", "plane_segmentation", "name"]),
            &json!("PlaneSegmentation")
        );
        let ParamNode::Parent(ophys) = &tree["ophys"] else {
            panic!("ophys should be a group");
        };
        let ParamNode::Parent(seg) = &ophys.children["plane_segmentation"] else {
            panic!("plane_segmentation should be a group");
        };
        assert_matches!(&seg.children["name"], ParamNode::Child(c) if c.path == "ophys/plane_segmentation/name");
    }

    #[test]
    fn build_same_name_in_different_sections() {
        let tree = build_param_tree(&[
            ParamDecl::str("name", "Device").section("device"),
            ParamDecl::str("name", "Channel").section("optical_channel"),
        ]);
        assert_eq!(value_at(&tree, &["device", "name"]), &json!("Device"));
        assert_eq!(value_at(&tree, &["optical_channel", "name"]), &json!("Channel"));
    }

    // -- merge_params -------------------------------------------------------

    #[test]
    fn merge_overwrites_nested_leaf_and_keeps_other_defaults() {
        let mut source = ParamTree::new();
        source.insert("b".into(), group(vec![("c", leaf(json!(5)))]));

        let merged = merge_params(&source, defaults());

        assert_eq!(value_at(&merged, &["a"]), &json!(1));
        assert_eq!(value_at(&merged, &["b", "c"]), &json!(5));
    }

    #[test]
    fn merge_drops_keys_unknown_to_defaults() {
        let mut source = ParamTree::new();
        source.insert("removed_param".into(), leaf(json!(9)));

        let merged = merge_params(&source, defaults());

        assert!(!merged.contains_key("removed_param"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_keeps_canonical_metadata() {
        let decls = [ParamDecl::int("cores", 2).doc("worker count")];
        let mut source = ParamTree::new();
        source.insert("cores".into(), ParamNode::Child(ParamChild::bare(json!(8))));

        let merged = merge_params(&source, build_param_tree(&decls));

        assert_matches!(&merged["cores"], ParamNode::Child(c) => {
            assert_eq!(c.value, json!(8));
            assert_eq!(c.data_type, Some(DataType::Int));
            assert_eq!(c.doc.as_deref(), Some("worker count"));
            assert_eq!(c.path, "cores");
        });
    }

    #[test]
    fn merge_keeps_default_on_shape_mismatch() {
        let mut source = ParamTree::new();
        source.insert("b".into(), leaf(json!(7)));

        let merged = merge_params(&source, defaults());

        assert_eq!(value_at(&merged, &["b", "c"]), &json!(2));
    }

    // -- legacy format ------------------------------------------------------

    #[test]
    fn format_detection() {
        assert!(is_typed_format(&json!({"x": {"type": "child", "value": 3}})));
        assert!(!is_typed_format(&json!({"x": 3})));
        assert!(!is_typed_format(&json!({"sec": {"y": 4}})));
        assert!(!is_typed_format(&json!({})));
    }

    #[test]
    fn legacy_and_typed_documents_merge_identically() {
        let decls = [
            ParamDecl::int("x", 0),
            ParamDecl::int("y", 0).section("sec"),
            ParamDecl::bool("z", true),
        ];
        let legacy = json!({"x": 3, "sec": {"y": 4}});
        let typed = json!({
            "x": {"type": "child", "value": 3},
            "sec": {"type": "parent", "children": {"y": {"type": "child", "value": 4}}}
        });

        let from_legacy = merge_params(
            &parse_stored_params(&legacy).unwrap(),
            build_param_tree(&decls),
        );
        let from_typed = merge_params(
            &parse_stored_params(&typed).unwrap(),
            build_param_tree(&decls),
        );

        assert_eq!(from_legacy, from_typed);
        assert_eq!(value_at(&from_legacy, &["sec", "y"]), &json!(4));
        assert_eq!(value_at(&from_legacy, &["z"]), &json!(true));
    }

    #[test]
    fn empty_or_null_stored_params_parse_to_empty_tree() {
        assert!(parse_stored_params(&Value::Null).unwrap().is_empty());
        assert!(parse_stored_params(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn unknown_data_type_tags_read_as_undeclared() {
        let typed = json!({
            "a": {"type": "child", "value": 1, "dataType": ["int", "list"]},
            "b": {"type": "child", "value": null, "dataType": "NoneType"}
        });
        let tree = parse_stored_params(&typed).unwrap();
        assert_matches!(&tree["a"], ParamNode::Child(c) if c.data_type == Some(DataType::Int));
        assert_matches!(&tree["b"], ParamNode::Child(c) if c.data_type.is_none());
    }

    // -- fix_param_value_type -----------------------------------------------

    #[test]
    fn fix_coerces_to_declared_types() {
        let mut tree = build_param_tree(&[
            ParamDecl::int("cores", 2),
            ParamDecl::float("rate", 1.0),
            ParamDecl::bool("flag", false),
            ParamDecl::str("label", ""),
            ParamDecl::none("optional", DataType::Int),
        ]);
        let stored = parse_stored_params(&json!({
            "cores": "4",
            "rate": 3,
            "flag": "true",
            "label": 12,
            "optional": null
        }))
        .unwrap();
        tree = merge_params(&stored, tree);

        fix_param_value_type(&mut tree);

        assert_eq!(value_at(&tree, &["cores"]), &json!(4));
        assert_eq!(value_at(&tree, &["rate"]), &json!(3.0));
        assert_eq!(value_at(&tree, &["flag"]), &json!(true));
        assert_eq!(value_at(&tree, &["label"]), &json!("12"));
        assert_eq!(value_at(&tree, &["optional"]), &Value::Null);
    }

    #[test]
    fn fix_truncates_float_to_int() {
        let mut tree = build_param_tree(&[ParamDecl::int("n", 0)]);
        tree = merge_params(&parse_stored_params(&json!({"n": 3.9})).unwrap(), tree);
        fix_param_value_type(&mut tree);
        assert_eq!(value_at(&tree, &["n"]), &json!(3));
    }

    #[test]
    fn fix_keeps_unconvertible_values() {
        let mut tree = build_param_tree(&[ParamDecl::int("n", 0)]);
        tree = merge_params(&parse_stored_params(&json!({"n": "many"})).unwrap(), tree);
        fix_param_value_type(&mut tree);
        assert_eq!(value_at(&tree, &["n"]), &json!("many"));
    }

    // -- flattening ---------------------------------------------------------

    #[test]
    fn key_value_and_flatten() {
        let kv = to_key_value(&defaults());
        assert_eq!(Value::Object(kv.clone()), json!({"a": 1, "b": {"c": 2}}));

        let flat = flatten(&kv);
        assert_eq!(Value::Object(flat), json!({"a": 1, "c": 2}));
    }

    #[test]
    fn tree_serializes_with_type_tags() {
        let tree = build_param_tree(&[ParamDecl::int("x", 1).section("sec")]);
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value["sec"]["type"], "parent");
        assert_eq!(value["sec"]["children"]["x"]["type"], "child");
        assert_eq!(value["sec"]["children"]["x"]["dataType"], "int");
        assert_eq!(value["sec"]["children"]["x"]["path"], "sec/x");
    }
}
