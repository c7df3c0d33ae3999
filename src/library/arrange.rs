//! Grouping and sorting engine
//!
//! Pure derivation of the shelf view: sort the document set, then partition
//! the sorted list into labeled shelves. No re-sorting inside a shelf, so the
//! sort order survives grouping.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::types::{Category, Document};

/// Sort mode, applied before grouping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Most recently uploaded first
    #[default]
    Recent,
    /// Highest rating first
    Rating,
    /// Furthest reading position first
    Progress,
    /// Longest document first
    Pages,
    /// Finished documents first, then title ascending
    Completed,
}

/// Grouping mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// Single shelf with every document
    #[default]
    None,
    Category,
    Status,
    Rating,
}

/// An ordered, labeled group of documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shelf {
    pub label: String,
    pub documents: Vec<Document>,
}

/// Sort and partition the document set into shelves
///
/// The sort is stable: ties keep their pre-sort relative order, so repeated
/// calls over an unchanged set never reorder visually identical items.
/// Shelves appear in first-encounter order of the sorted list.
pub fn arrange(
    documents: &[Document],
    categories: &[Category],
    group_by: GroupBy,
    sort_by: SortBy,
) -> Vec<Shelf> {
    let mut sorted: Vec<Document> = documents.to_vec();
    sorted.sort_by(comparator(sort_by));

    let mut shelves: Vec<Shelf> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for doc in sorted {
        let (key, label) = shelf_key(&doc, categories, group_by);
        match index.get(&key) {
            Some(&i) => shelves[i].documents.push(doc),
            None => {
                index.insert(key, shelves.len());
                shelves.push(Shelf {
                    label,
                    documents: vec![doc],
                });
            }
        }
    }

    shelves
}

fn comparator(sort_by: SortBy) -> impl FnMut(&Document, &Document) -> Ordering {
    move |a, b| match sort_by {
        SortBy::Recent => b.uploaded_at.cmp(&a.uploaded_at),
        SortBy::Rating => b.rating.cmp(&a.rating),
        SortBy::Progress => b.current_page.cmp(&a.current_page),
        SortBy::Pages => b.total_pages.cmp(&a.total_pages),
        SortBy::Completed => b
            .is_finished()
            .cmp(&a.is_finished())
            .then_with(|| title_sort_key(&a.title).cmp(&title_sort_key(&b.title))),
    }
}

/// Case-insensitive title key; stands in for a locale collation
fn title_sort_key(title: &str) -> String {
    title.to_lowercase()
}

fn shelf_key(doc: &Document, categories: &[Category], group_by: GroupBy) -> (String, String) {
    match group_by {
        GroupBy::None => ("all".to_string(), "All".to_string()),
        GroupBy::Category => {
            let category = doc
                .category_id
                .as_deref()
                .and_then(|id| categories.iter().find(|c| c.id == id));
            match category {
                Some(c) => (format!("category:{}", c.id), c.name.clone()),
                // No category assigned, or the id dangles (corrupt snapshot)
                None => ("category:none".to_string(), "Uncategorized".to_string()),
            }
        }
        GroupBy::Status => {
            let label = doc.status.label();
            (format!("status:{label}"), label.to_string())
        }
        GroupBy::Rating => {
            let label = rating_label(doc.rating);
            (format!("rating:{}", doc.rating), label)
        }
    }
}

fn rating_label(rating: u8) -> String {
    match rating {
        0 => "Unrated".to_string(),
        1 => "1 star".to_string(),
        n => format!("{n} stars"),
    }
}
