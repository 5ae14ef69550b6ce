// ==========================================
// Hagenbach-Bischoff - 分配树
// ==========================================
// 结构: Root → [ListUnion → [SubListUnion →]] List
// 存储: arena（Vec<ApportionmentNode>），节点间以下标引用
// ==========================================

use crate::domain::apportionment::{ApportionmentNode, NodeIndex, NodeKey};
use crate::domain::political_business::ListUnion;
use crate::domain::types::{ListId, ListUnionId};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HbListInput {
    pub list_id: ListId,
    pub position: u32,
    pub vote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HbInput {
    pub number_of_mandates: u32,
    pub lists: Vec<HbListInput>,
    #[serde(default)]
    pub list_unions: Vec<ListUnion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApportionmentTree {
    nodes: Vec<ApportionmentNode>,
}

impl ApportionmentTree {
    pub const ROOT: NodeIndex = NodeIndex(0);

    /// 由名单与联合定义建树
    ///
    /// # 校验
    /// - 名单 id 不重复
    /// - 一个名单最多属于一个顶层联合、一个子联合
    /// - 子联合的名单必须属于其父联合
    pub fn build(input: &HbInput) -> EngineResult<Self> {
        if input.lists.is_empty() {
            return Err(EngineError::Validation("no lists to apportion".to_string()));
        }

        let mut lists: BTreeMap<ListId, &HbListInput> = BTreeMap::new();
        for list in &input.lists {
            if lists.insert(list.list_id, list).is_some() {
                return Err(EngineError::Validation(format!("duplicate list {}", list.list_id)));
            }
        }

        let top_unions: BTreeMap<ListUnionId, &ListUnion> = input
            .list_unions
            .iter()
            .filter(|u| u.parent_id.is_none())
            .map(|u| (u.id, u))
            .collect();

        // 名单 → 顶层联合 / 子联合
        let mut top_of_list: BTreeMap<ListId, ListUnionId> = BTreeMap::new();
        let mut sub_of_list: BTreeMap<ListId, ListUnionId> = BTreeMap::new();

        for union in top_unions.values() {
            for list_id in &union.list_ids {
                if !lists.contains_key(list_id) {
                    return Err(EngineError::not_found("List", list_id));
                }
                if top_of_list.insert(*list_id, union.id).is_some() {
                    return Err(EngineError::Validation(format!(
                        "list {} belongs to more than one list union",
                        list_id
                    )));
                }
            }
        }

        for union in &input.list_unions {
            let Some(parent_id) = union.parent_id else {
                continue;
            };
            if !top_unions.contains_key(&parent_id) {
                return Err(EngineError::not_found("ListUnion", parent_id));
            }
            for list_id in &union.list_ids {
                if top_of_list.get(list_id) != Some(&parent_id) {
                    return Err(EngineError::Validation(format!(
                        "list {} of sub list union {} is not part of its parent union",
                        list_id, union.id
                    )));
                }
                if sub_of_list.insert(*list_id, union.id).is_some() {
                    return Err(EngineError::Validation(format!(
                        "list {} belongs to more than one sub list union",
                        list_id
                    )));
                }
            }
        }

        let mut tree = ApportionmentTree {
            nodes: vec![ApportionmentNode {
                key: NodeKey::Root,
                parent: None,
                children: Vec::new(),
                position: 0,
                vote_count: 0,
                seats: 0,
            }],
        };

        let mut union_nodes: BTreeMap<ListUnionId, NodeIndex> = BTreeMap::new();
        let used_top: BTreeSet<ListUnionId> = top_of_list.values().copied().collect();
        for union_id in used_top {
            let index = tree.push(NodeKey::ListUnion(union_id), Self::ROOT);
            union_nodes.insert(union_id, index);
        }

        let used_sub: BTreeSet<ListUnionId> = sub_of_list.values().copied().collect();
        for union in input.list_unions.iter().filter(|u| used_sub.contains(&u.id)) {
            let Some(parent_id) = union.parent_id else {
                continue;
            };
            let parent = union_nodes
                .get(&parent_id)
                .copied()
                .ok_or_else(|| EngineError::not_found("ListUnion", parent_id))?;
            let index = tree.push(NodeKey::SubListUnion(union.id), parent);
            union_nodes.insert(union.id, index);
        }

        for list in lists.values() {
            let parent = sub_of_list
                .get(&list.list_id)
                .or_else(|| top_of_list.get(&list.list_id))
                .and_then(|u| union_nodes.get(u).copied())
                .unwrap_or(Self::ROOT);
            let index = tree.push(NodeKey::List(list.list_id), parent);
            tree.nodes[index.0].position = list.position;
            tree.nodes[index.0].vote_count = list.vote_count;
        }

        tree.accumulate(Self::ROOT);
        tree.sort_children();
        Ok(tree)
    }

    fn push(&mut self, key: NodeKey, parent: NodeIndex) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(ApportionmentNode {
            key,
            parent: Some(parent),
            children: Vec::new(),
            position: u32::MAX,
            vote_count: 0,
            seats: 0,
        });
        self.nodes[parent.0].children.push(index);
        index
    }

    /// 自底向上累加得票与位置
    fn accumulate(&mut self, index: NodeIndex) -> (u64, u32) {
        if self.nodes[index.0].is_leaf() {
            let node = &self.nodes[index.0];
            return (node.vote_count, node.position);
        }

        let children = self.nodes[index.0].children.clone();
        let mut votes = 0;
        let mut position = u32::MAX;
        for child in children {
            let (v, p) = self.accumulate(child);
            votes += v;
            position = position.min(p);
        }
        let node = &mut self.nodes[index.0];
        node.vote_count = votes;
        if index != Self::ROOT {
            node.position = position;
        }
        (votes, position)
    }

    fn sort_children(&mut self) {
        let order: Vec<(u32, NodeKey)> = self.nodes.iter().map(|n| (n.position, n.key)).collect();
        for node in &mut self.nodes {
            node.children.sort_by_key(|c| order[c.0]);
        }
    }

    pub fn node(&self, index: NodeIndex) -> &ApportionmentNode {
        &self.nodes[index.0]
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut ApportionmentNode {
        &mut self.nodes[index.0]
    }

    pub fn nodes(&self) -> &[ApportionmentNode] {
        &self.nodes
    }

    pub fn root(&self) -> &ApportionmentNode {
        self.node(Self::ROOT)
    }

    pub fn find(&self, key: &NodeKey) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| &n.key == key).map(NodeIndex)
    }

    /// 叶子名单的议席
    pub fn list_seats(&self) -> BTreeMap<ListId, u32> {
        self.nodes
            .iter()
            .filter_map(|n| match n.key {
                NodeKey::List(id) => Some((id, n.seats)),
                _ => None,
            })
            .collect()
    }

    /// 某节点下的全部名单（深度优先）
    pub fn descendant_lists(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let node = self.node(index);
        if node.is_leaf() {
            return vec![index];
        }
        node.children
            .iter()
            .flat_map(|c| self.descendant_lists(*c))
            .collect()
    }
}
