// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reference table lists.
//!
//! The set of immutable tables loaded into the reference cache is injected
//! configuration. A default catalog, grouped by category, covers the common
//! game-definition tables.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Longest accepted table name.
pub const MAX_TABLE_NAME_LEN: usize = 64;

/// Default reference tables, grouped by category.
pub const DEFAULT_CATALOG: &[(&str, &[&str])] = &[
    (
        "items",
        &[
            "item_desc",
            "item_category_desc",
            "item_rarity_desc",
            "item_slot_desc",
            "item_effect_desc",
            "item_attribute_desc",
        ],
    ),
    (
        "crafting",
        &["recipe_desc", "crafting_station_desc", "ingredient_desc", "crafting_skill_desc"],
    ),
    ("terrain", &["terrain_desc", "biome_desc", "resource_spawn_desc", "terrain_feature_desc"]),
    (
        "buildings",
        &[
            "building_desc",
            "building_category_desc",
            "building_upgrade_desc",
            "building_requirement_desc",
        ],
    ),
    (
        "npcs",
        &[
            "npc_desc",
            "npc_type_desc",
            "dialogue_desc",
            "quest_desc",
            "quest_objective_desc",
            "quest_reward_desc",
        ],
    ),
    ("skills", &["skill_desc", "skill_tree_desc", "skill_level_desc", "achievement_desc"]),
    ("combat", &["stat_desc", "damage_type_desc", "status_effect_desc", "combat_ability_desc"]),
];

/// Returns the catalog tables for `category`, if it exists.
pub fn catalog_category(category: &str) -> Option<&'static [&'static str]> {
    DEFAULT_CATALOG
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, tables)| *tables)
}

/// Returns true if `name` is 1-64 characters of ASCII letters, digits and `_`.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_TABLE_NAME_LEN
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// A validated, ordered, duplicate-free list of reference tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTables {
    names: Vec<String>,
    index: HashSet<String>,
}

impl ReferenceTables {
    /// Validates and wraps a table list.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Vec::new();
        let mut index = HashSet::new();
        for name in names {
            let name = name.into();
            if !is_valid_table_name(&name) {
                return Err(Error::InvalidTableName(name));
            }
            if !index.insert(name.clone()) {
                return Err(Error::DuplicateTable(name));
            }
            list.push(name);
        }
        if list.is_empty() {
            return Err(Error::EmptyTableList);
        }
        Ok(ReferenceTables { names: list, index })
    }

    /// Every table in the default catalog, in category order.
    pub fn default_catalog() -> Self {
        let names: Vec<String> = DEFAULT_CATALOG
            .iter()
            .flat_map(|(_, tables)| tables.iter().map(|t| t.to_string()))
            .collect();
        let index = names.iter().cloned().collect();
        ReferenceTables { names, index }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Splits the list into consecutive batches of at most `size` tables.
    /// A zero size is treated as one.
    pub fn batches(&self, size: usize) -> impl Iterator<Item = &[String]> {
        self.names.chunks(size.max(1))
    }
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::default_catalog()
    }
}

#[cfg(test)]
#[path = "tables_tests.rs"]
mod tests;
