/*!
# FeatherPack

A small web application for keeping backpacking gear lists, written in Rust.

## Overview

Every gear list is a CSV file in one data directory. The browser UI shows a
list category by category, lets the operator edit rows in place, add and
delete categories, keep a free-text note per list, and see the weight
summary and a per-category breakdown. A single shared password unlocks
editing; without it everything is read-only.

## Architecture

### Data Layer
- **Item model** - The row schema (`name, desc, category, weight, qty,
  wearable, consumable, luxury`) and the in-memory gear list
- **CSV Store** - Create, load, save and enumerate lists. Saves are written
  to a temporary file and renamed over the old one
- **Notes Sidecar** - `trip.csv` keeps its note in `trip_notes.txt`

### Core Logic
- **Aggregator** - Item totals (`quantity * weight`), category totals, the
  summary (total, wearable, consumable, luxury, base) and the sort rule:
  categories by descending total, rows by descending item total, ties kept
  in their original order
- **Session** - Edits are staged in a draft and written by an explicit save.
  Category add/delete are written immediately. A fingerprint of the file
  taken at read time guards every write against overwriting someone else's
  save

### Web Layer (feature `web`)
- axum router with a JSON API and one static page
- Cookie-identified sessions holding the password flag, the open list and
  the pending category delete

## Base weight

`base = total - wearable - consumable`. Luxury items are reported on their
own but stay inside the base weight.

## Modules

- **item**: Item rows, the column schema and the gear list container
- **aggregate**: Totals, breakdown and the sort rule
- **store**: CSV persistence
- **notes**: Per-list note files
- **export**: `.tar.gz` bundle of a list and its note
- **auth**: SHA-256 password gate
- **session**: Draft/committed editing state per browser session
- **config**: Command-line configuration
- **error**: Error type shared by every module
- **app**: Routing and handlers (feature `web`)

## REST API Endpoints

- `GET /api/lists` - Available gear lists
- `GET /api/lists/{name}` - Open a list into the session
- `PUT /api/lists/{name}/categories/{category}` - Stage an edited category table
- `POST /api/lists/{name}/save` - Sort and persist the draft
- `GET /api/lists/{name}/export` - Download the list and its note
*/

pub mod aggregate;
pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod item;
pub mod notes;
pub mod session;
pub mod store;

#[cfg(feature = "web")]
pub mod app;

/// Re-export the types most callers need
pub use aggregate::{Summary, category_totals, sort_gear_list, summarize};
pub use error::{Result, StoreError};
pub use item::{GearList, Item, ItemEdit};
pub use session::{OpenList, SessionState};
pub use store::GearStore;
