use serde::{Deserialize, Serialize};

/// Column names written to every gear list file, in order.
pub const COLUMNS: [&str; 8] = [
    "name",
    "desc",
    "category",
    "weight",
    "qty",
    "wearable",
    "consumable",
    "luxury",
];

/// One stored column of a gear list file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Name,
    Desc,
    Category,
    Weight,
    Qty,
    Wearable,
    Consumable,
    Luxury,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Name,
        Column::Desc,
        Column::Category,
        Column::Weight,
        Column::Qty,
        Column::Wearable,
        Column::Consumable,
        Column::Luxury,
    ];

    /// Resolve a header cell to a column, accepting the icon headers the
    /// table editor shows.
    pub fn from_header(header: &str) -> Option<Self> {
        match header.trim_start_matches('\u{feff}').trim() {
            "name" => Some(Column::Name),
            "desc" => Some(Column::Desc),
            "category" => Some(Column::Category),
            "weight" | "⚖️" | "⚖" => Some(Column::Weight),
            "qty" | "quantity" | "#" => Some(Column::Qty),
            "wearable" | "👕" => Some(Column::Wearable),
            "consumable" | "🍞" => Some(Column::Consumable),
            "luxury" | "📸" => Some(Column::Luxury),
            _ => None,
        }
    }

    pub fn header(self) -> &'static str {
        COLUMNS[self as usize]
    }
}

/// A single row of a gear list.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Item {
    pub name: String,
    pub desc: String,
    pub category: String,
    pub weight: f64,
    #[serde(alias = "qty")]
    pub quantity: i64,
    pub wearable: bool,
    pub consumable: bool,
    pub luxury: bool,
}

impl Item {
    pub fn new(name: &str, category: &str, weight: f64, quantity: i64) -> Self {
        Item {
            name: name.to_string(),
            category: category.to_string(),
            weight,
            quantity,
            ..Item::default()
        }
    }

    /// The row inserted when a category is created or a row is added to it.
    pub fn placeholder(category: &str) -> Self {
        Item {
            category: category.to_string(),
            quantity: 1,
            weight: 0.0,
            ..Item::default()
        }
    }

    /// `quantity * weight`, with non-finite weights counted as zero.
    pub fn total_weight(&self) -> f64 {
        let total = self.quantity as f64 * self.weight;
        if total.is_finite() { total } else { 0.0 }
    }

    pub fn has_category(&self) -> bool {
        !self.category.trim().is_empty()
    }
}

/// A row as edited inside one category table. The category is implied by the
/// table and is attached again when the fragment is merged.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ItemEdit {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default, alias = "qty")]
    pub quantity: i64,
    #[serde(default)]
    pub wearable: bool,
    #[serde(default)]
    pub consumable: bool,
    #[serde(default)]
    pub luxury: bool,
}

impl ItemEdit {
    pub fn into_item(self, category: &str) -> Item {
        Item {
            name: self.name,
            desc: self.desc,
            category: category.to_string(),
            weight: self.weight,
            quantity: self.quantity,
            wearable: self.wearable,
            consumable: self.consumable,
            luxury: self.luxury,
        }
    }
}

impl From<&Item> for ItemEdit {
    fn from(item: &Item) -> Self {
        ItemEdit {
            name: item.name.clone(),
            desc: item.desc.clone(),
            weight: item.weight,
            quantity: item.quantity,
            wearable: item.wearable,
            consumable: item.consumable,
            luxury: item.luxury,
        }
    }
}

/// An ordered collection of items, the in-memory form of one gear list file.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct GearList {
    pub items: Vec<Item>,
}

impl GearList {
    pub fn new() -> Self {
        GearList { items: Vec::new() }
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        GearList { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct non-empty categories in first-encounter order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for item in self.items.iter().filter(|i| i.has_category()) {
            if !seen.iter().any(|c| *c == item.category) {
                seen.push(item.category.clone());
            }
        }
        seen
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.items.iter().any(|i| i.category == category)
    }

    /// Items of one category, in list order.
    pub fn items_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |i| i.category == category)
    }
}
