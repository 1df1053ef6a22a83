//! Joined accessibility/DOM tree.
//!
//! The accessibility tree is the agent-readable view (roles and names);
//! the DOM tree is the addressable view (tags and XPaths). Joining them
//! through backend node ids lets a caller name an element by its AX id
//! and act on it: the id→xpath map produced here is what the selector
//! resolver consults for numeric tokens until the next tree view.

use std::collections::{HashMap, HashSet};

use br_protocol::TreeNode;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::accessibility::{self, AxNode, GetFullAxTreeParams};
use chromiumoxide::cdp::browser_protocol::dom::{GetDocumentParams, Node};

use crate::browser::driver::{Driver, DriverError, DriverResult};

/// Tag + document-rooted XPath of one DOM element, keyed by backend id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomInfo {
	pub tag: String,
	pub xpath: String,
}

/// Tree view result: the joined tree plus the numeric-id resolution map.
#[derive(Debug)]
pub struct JoinedTree {
	pub tree: TreeNode,
	pub id_xpath: HashMap<u64, String>,
}

/// Fetch both full trees over CDP and join them.
pub async fn build(driver: &Driver, page: &Page) -> DriverResult<JoinedTree> {
	let _ = driver; // tree building needs only the page's CDP channel
	page.execute(accessibility::EnableParams::default()).await?;
	let ax = page.execute(GetFullAxTreeParams::builder().build()).await?;
	let dom = page.execute(GetDocumentParams::builder().depth(-1).build()).await?;

	let dom_map = collect_dom(&dom.result.root);
	join(&ax.result.nodes, &dom_map).ok_or_else(|| DriverError::Other(anyhow::anyhow!("empty accessibility tree")))
}

/// Walk the DOM depth-first, computing an XPath for every element node.
///
/// Segment is `tag`, or `tag[k]` (1-based among same-tag element
/// siblings) when the tag occurs more than once at that level.
pub fn collect_dom(root: &Node) -> HashMap<i64, DomInfo> {
	let mut out = HashMap::new();
	// The document node contributes no segment; its element children
	// (normally just <html>) root the paths.
	descend(root, "", &mut out);
	out
}

fn descend(node: &Node, prefix: &str, out: &mut HashMap<i64, DomInfo>) {
	let Some(children) = &node.children else { return };

	let mut tag_totals: HashMap<String, usize> = HashMap::new();
	for child in children.iter().filter(|c| c.node_type == 1) {
		*tag_totals.entry(element_tag(child)).or_default() += 1;
	}

	let mut tag_seen: HashMap<String, usize> = HashMap::new();
	for child in children {
		if child.node_type != 1 {
			continue;
		}
		let tag = element_tag(child);
		let ordinal = {
			let seen = tag_seen.entry(tag.clone()).or_default();
			*seen += 1;
			*seen
		};
		let segment = if tag_totals[&tag] > 1 {
			format!("{tag}[{ordinal}]")
		} else {
			tag.clone()
		};
		let xpath = format!("{prefix}/{segment}");
		out.insert(
			*child.backend_node_id.inner(),
			DomInfo {
				tag: tag.clone(),
				xpath: xpath.clone(),
			},
		);
		descend(child, &xpath, out);
	}
}

fn element_tag(node: &Node) -> String {
	if node.local_name.is_empty() {
		node.node_name.to_ascii_lowercase()
	} else {
		node.local_name.clone()
	}
}

/// Join the flat AX node list into a tree rooted at the node no other
/// node claims as a child (fallback: the first node).
pub fn join(nodes: &[AxNode], dom_map: &HashMap<i64, DomInfo>) -> Option<JoinedTree> {
	let by_id: HashMap<&str, &AxNode> = nodes.iter().map(|n| (n.node_id.inner().as_str(), n)).collect();

	let mut referenced: HashSet<&str> = HashSet::new();
	for node in nodes {
		if let Some(child_ids) = &node.child_ids {
			for id in child_ids {
				referenced.insert(id.inner().as_str());
			}
		}
	}

	let root = nodes
		.iter()
		.find(|n| !referenced.contains(n.node_id.inner().as_str()))
		.or_else(|| nodes.first())?;

	let mut id_xpath = HashMap::new();
	let tree = convert(root, &by_id, dom_map, &mut id_xpath);
	Some(JoinedTree { tree, id_xpath })
}

fn convert(
	node: &AxNode,
	by_id: &HashMap<&str, &AxNode>,
	dom_map: &HashMap<i64, DomInfo>,
	id_xpath: &mut HashMap<u64, String>,
) -> TreeNode {
	let id = node.node_id.inner().parse::<u64>().unwrap_or(0);

	let dom = node
		.backend_dom_node_id
		.as_ref()
		.and_then(|backend| dom_map.get(backend.inner()));

	if let Some(info) = dom {
		if id != 0 {
			id_xpath.insert(id, info.xpath.clone());
		}
	}

	let children = node
		.child_ids
		.iter()
		.flatten()
		.filter_map(|child_id| by_id.get(child_id.inner().as_str()))
		.map(|child| convert(child, by_id, dom_map, id_xpath))
		.collect();

	TreeNode {
		id,
		role: ax_value_str(node.role.as_ref()).unwrap_or_default(),
		name: ax_value_str(node.name.as_ref()),
		tag: dom.map(|info| format!("<{}>", info.tag)),
		xpath: dom.map(|info| info.xpath.clone()),
		children,
	}
}

fn ax_value_str(value: Option<&accessibility::AxValue>) -> Option<String> {
	let raw = value?.value.as_ref()?;
	match raw {
		serde_json::Value::String(s) => Some(s.clone()),
		other => Some(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn dom_from(value: serde_json::Value) -> Node {
		serde_json::from_value(value).unwrap()
	}

	fn ax_from(value: serde_json::Value) -> Vec<AxNode> {
		serde_json::from_value(value).unwrap()
	}

	/// `<html><body><ul><li>a</li><li>b</li></ul></body></html>`
	fn list_document() -> Node {
		dom_from(json!({
			"nodeId": 1, "backendNodeId": 1, "nodeType": 9,
			"nodeName": "#document", "localName": "", "nodeValue": "",
			"children": [{
				"nodeId": 2, "backendNodeId": 2, "nodeType": 1,
				"nodeName": "HTML", "localName": "html", "nodeValue": "",
				"children": [{
					"nodeId": 3, "backendNodeId": 3, "nodeType": 1,
					"nodeName": "BODY", "localName": "body", "nodeValue": "",
					"children": [{
						"nodeId": 4, "backendNodeId": 4, "nodeType": 1,
						"nodeName": "UL", "localName": "ul", "nodeValue": "",
						"children": [
							{
								"nodeId": 5, "backendNodeId": 5, "nodeType": 1,
								"nodeName": "LI", "localName": "li", "nodeValue": "",
								"children": [{
									"nodeId": 7, "backendNodeId": 7, "nodeType": 3,
									"nodeName": "#text", "localName": "", "nodeValue": "a"
								}]
							},
							{
								"nodeId": 6, "backendNodeId": 6, "nodeType": 1,
								"nodeName": "LI", "localName": "li", "nodeValue": "",
								"children": [{
									"nodeId": 8, "backendNodeId": 8, "nodeType": 3,
									"nodeName": "#text", "localName": "", "nodeValue": "b"
								}]
							}
						]
					}]
				}]
			}]
		}))
	}

	#[test]
	fn xpaths_index_same_tag_siblings() {
		let map = collect_dom(&list_document());
		assert_eq!(map[&2].xpath, "/html");
		assert_eq!(map[&3].xpath, "/html/body");
		assert_eq!(map[&4].xpath, "/html/body/ul");
		assert_eq!(map[&5].xpath, "/html/body/ul/li[1]");
		assert_eq!(map[&6].xpath, "/html/body/ul/li[2]");
	}

	#[test]
	fn unique_tags_omit_the_index() {
		let map = collect_dom(&list_document());
		// Only one <ul> among body's children, so no [1].
		assert!(!map[&4].xpath.contains('['));
	}

	#[test]
	fn join_produces_ids_tags_and_map() {
		let dom_map = collect_dom(&list_document());
		let nodes = ax_from(json!([
			{
				"nodeId": "1", "ignored": false,
				"role": { "type": "role", "value": "RootWebArea" },
				"childIds": ["2", "3"], "backendDOMNodeId": 3
			},
			{
				"nodeId": "2", "ignored": false,
				"role": { "type": "role", "value": "listitem" },
				"name": { "type": "computedString", "value": "a" },
				"backendDOMNodeId": 5
			},
			{
				"nodeId": "3", "ignored": false,
				"role": { "type": "role", "value": "listitem" },
				"name": { "type": "computedString", "value": "b" },
				"backendDOMNodeId": 6
			}
		]));

		let joined = join(&nodes, &dom_map).unwrap();
		assert_eq!(joined.tree.id, 1);
		assert_eq!(joined.tree.role, "RootWebArea");
		assert_eq!(joined.tree.children.len(), 2);

		let first = &joined.tree.children[0];
		assert_eq!(first.name.as_deref(), Some("a"));
		assert_eq!(first.tag.as_deref(), Some("<li>"));
		assert_eq!(first.xpath.as_deref(), Some("/html/body/ul/li[1]"));

		assert_eq!(joined.id_xpath[&2], "/html/body/ul/li[1]");
		assert_eq!(joined.id_xpath[&3], "/html/body/ul/li[2]");
	}

	#[test]
	fn root_is_the_unreferenced_node() {
		let dom_map = HashMap::new();
		// Listed child-first; the root must still be found.
		let nodes = ax_from(json!([
			{ "nodeId": "9", "ignored": false, "role": { "type": "role", "value": "generic" } },
			{ "nodeId": "1", "ignored": false, "role": { "type": "role", "value": "RootWebArea" }, "childIds": ["9"] }
		]));
		let joined = join(&nodes, &dom_map).unwrap();
		assert_eq!(joined.tree.id, 1);
	}
}
