//! Weight totals and the ordering rule applied before every display and save.

use serde::Serialize;

use crate::item::{GearList, Item, ItemEdit};

/// Summary totals over a whole gear list.
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Default)]
pub struct Summary {
    pub total: f64,
    pub wearable_total: f64,
    pub consumable_total: f64,
    pub luxury_total: f64,
    /// `total - wearable_total - consumable_total`. Luxury items stay in base.
    pub base_total: f64,
}

/// One category with its rows in display order.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct CategoryView {
    pub category: String,
    pub label: String,
    pub total: f64,
    pub rows: Vec<ItemEdit>,
    pub row_totals: Vec<f64>,
}

/// One slice of the category breakdown chart.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct CategoryShare {
    pub category: String,
    pub total: f64,
    pub share: f64,
}

pub fn summarize(list: &GearList) -> Summary {
    let mut summary = Summary::default();

    for item in list.items.iter().filter(|i| i.has_category()) {
        let weight = item.total_weight();
        summary.total += weight;
        if item.wearable {
            summary.wearable_total += weight;
        }
        if item.consumable {
            summary.consumable_total += weight;
        }
        if item.luxury {
            summary.luxury_total += weight;
        }
    }

    summary.base_total = summary.total - summary.wearable_total - summary.consumable_total;
    summary
}

/// Total weight per category, in first-encounter order.
pub fn category_totals(list: &GearList) -> Vec<(String, f64)> {
    let mut totals: Vec<(String, f64)> = Vec::new();

    for item in list.items.iter().filter(|i| i.has_category()) {
        match totals.iter_mut().find(|(c, _)| *c == item.category) {
            Some((_, total)) => *total += item.total_weight(),
            None => totals.push((item.category.clone(), item.total_weight())),
        }
    }

    totals
}

pub fn category_total(list: &GearList, category: &str) -> f64 {
    list.items_in(category).map(Item::total_weight).sum()
}

/// Categories by descending total, rows within a category by descending item
/// total. Both sorts are stable, so ties keep their original order. Rows
/// without a category are dropped.
pub fn sort_gear_list(list: &GearList) -> GearList {
    let mut totals = category_totals(list);
    totals.sort_by(|(_, a), (_, b)| b.total_cmp(a));

    let mut items = Vec::with_capacity(list.len());
    for (category, _) in &totals {
        let mut rows: Vec<&Item> = list.items_in(category).collect();
        rows.sort_by(|a, b| b.total_weight().total_cmp(&a.total_weight()));
        items.extend(rows.into_iter().cloned());
    }

    GearList::from_items(items)
}

/// Per-category tables in display order.
pub fn category_views(list: &GearList) -> Vec<CategoryView> {
    let sorted = sort_gear_list(list);

    category_totals(&sorted)
        .into_iter()
        .map(|(category, total)| {
            let items: Vec<&Item> = sorted.items_in(&category).collect();
            let rows = items.iter().map(|i| ItemEdit::from(*i)).collect();
            let row_totals = items.iter().map(|i| i.total_weight()).collect();
            CategoryView {
                label: display_category(&category),
                category,
                total,
                rows,
                row_totals,
            }
        })
        .collect()
}

/// Data behind the category pie chart.
pub fn category_breakdown(list: &GearList) -> Vec<CategoryShare> {
    let mut totals = category_totals(list);
    totals.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    let grand_total: f64 = totals.iter().map(|(_, t)| t).sum();

    totals
        .into_iter()
        .map(|(category, total)| CategoryShare {
            share: if grand_total > 0.0 {
                total / grand_total
            } else {
                0.0
            },
            category,
            total,
        })
        .collect()
}

/// Title-cases a category name for use as a table heading.
pub fn display_category(category: &str) -> String {
    let mut label = String::with_capacity(category.len());
    let mut at_word_start = true;

    for c in category.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                label.extend(c.to_uppercase());
            } else {
                label.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            label.push(c);
            at_word_start = true;
        }
    }

    label
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, category: &str, weight: f64, quantity: i64) -> Item {
        Item::new(name, category, weight, quantity)
    }

    fn tent_and_bar() -> GearList {
        let mut bar = item("bar", "food", 50.0, 3);
        bar.consumable = true;
        GearList::from_items(vec![item("tent", "shelter", 1200.0, 1), bar])
    }

    #[test]
    fn test_tent_and_bar_example() {
        let list = tent_and_bar();
        let totals = category_totals(&list);
        assert_eq!(
            totals,
            vec![("shelter".to_string(), 1200.0), ("food".to_string(), 150.0)]
        );

        let summary = summarize(&list);
        assert_eq!(summary.total, 1350.0);
        assert_eq!(summary.consumable_total, 150.0);
        assert_eq!(summary.wearable_total, 0.0);
        assert_eq!(summary.base_total, 1200.0);

        let sorted = sort_gear_list(&list);
        assert_eq!(sorted.items[0].category, "shelter");
        assert_eq!(sorted.items[1].category, "food");
    }

    #[test]
    fn test_luxury_stays_in_base() {
        let mut camera = item("camera", "electronics", 400.0, 1);
        camera.luxury = true;
        let mut book = item("book", "fun", 300.0, 1);
        book.luxury = true;
        let list = GearList::from_items(vec![camera, book]);

        let summary = summarize(&list);
        assert_eq!(summary.luxury_total, 700.0);
        assert_eq!(summary.base_total, summary.total);
        assert_eq!(summary.base_total, 700.0);
    }

    #[test]
    fn test_category_totals_sum_to_total() {
        let mut rain = item("rain jacket", "clothing", 250.5, 1);
        rain.wearable = true;
        let list = GearList::from_items(vec![
            item("stove", "kitchen", 80.0, 1),
            rain,
            item("gas", "kitchen", 230.0, 2),
            item("socks", "clothing", 45.0, 3),
            item("orphan", "", 999.0, 1),
        ]);

        let totals = category_totals(&list);
        assert_eq!(category_total(&list, "kitchen"), 540.0);
        assert_eq!(category_total(&list, "clothing"), 385.5);

        let sum: f64 = totals.iter().map(|(_, t)| t).sum();
        assert_eq!(sum, summarize(&list).total);
        assert!(!totals.iter().any(|(c, _)| c.is_empty()));
    }

    #[test]
    fn test_sort_orders_categories_and_rows() {
        let list = GearList::from_items(vec![
            item("spoon", "kitchen", 20.0, 1),
            item("quilt", "sleep", 600.0, 1),
            item("pot", "kitchen", 120.0, 1),
            item("pad", "sleep", 400.0, 1),
            item("cup", "kitchen", 20.0, 1),
        ]);

        let sorted = sort_gear_list(&list);
        let names: Vec<&str> = sorted.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["quilt", "pad", "pot", "spoon", "cup"]);
    }

    #[test]
    fn test_sort_ties_keep_encounter_order() {
        let list = GearList::from_items(vec![
            item("a", "first", 100.0, 1),
            item("b", "second", 50.0, 2),
            item("c", "third", 100.0, 1),
        ]);

        let sorted = sort_gear_list(&list);
        let categories: Vec<&str> = sorted.items.iter().map(|i| i.category.as_str()).collect();
        assert_eq!(categories, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let list = GearList::from_items(vec![
            item("x", "b", 10.0, 1),
            item("y", "a", 5.0, 4),
            item("z", "b", 30.0, 1),
            item("w", "c", 0.0, 1),
        ]);

        let once = sort_gear_list(&list);
        let twice = sort_gear_list(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rows_without_category_are_dropped() {
        let list = GearList::from_items(vec![item("lost", "  ", 10.0, 1), item("kept", "misc", 1.0, 1)]);
        let sorted = sort_gear_list(&list);
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted.items[0].name, "kept");
        assert_eq!(summarize(&list).total, 1.0);
    }

    #[test]
    fn test_non_finite_weight_counts_as_zero() {
        let list = GearList::from_items(vec![item("bad", "misc", f64::NAN, 2), item("ok", "misc", 3.0, 2)]);
        assert_eq!(summarize(&list).total, 6.0);
    }

    #[test]
    fn test_breakdown_shares() {
        let list = tent_and_bar();
        let breakdown = category_breakdown(&list);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category, "shelter");
        assert!((breakdown[0].share - 1200.0 / 1350.0).abs() < 1e-9);

        let empty = GearList::from_items(vec![item("nothing", "misc", 0.0, 1)]);
        assert_eq!(category_breakdown(&empty)[0].share, 0.0);
    }

    #[test]
    fn test_category_views() {
        let views = category_views(&tent_and_bar());
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].label, "Shelter");
        assert_eq!(views[1].rows[0].name, "bar");
        assert_eq!(views[1].row_totals, vec![150.0]);
        assert_eq!(views[1].total, 150.0);
    }

    #[test]
    fn test_display_category() {
        assert_eq!(display_category("sleep system"), "Sleep System");
        assert_eq!(display_category("FIRST-aid"), "First-Aid");
        assert_eq!(display_category(""), "");
    }
}
