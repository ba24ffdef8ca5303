//! Record documents kept by the store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of item slots in one backpack.
pub const BACKPACK_SLOTS: usize = 40;

/// A document the [`crate::RecordStore`] can persist and check.
pub trait StoredRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The document handed out when nothing usable exists.
    fn empty() -> Self;

    /// Number of slots, occupied or not.
    fn slot_count(&self) -> usize;

    /// Number of slots holding something.
    fn occupied(&self) -> usize;

    /// Best-effort rebuild from bytes that no longer parse as a whole.
    fn salvage(bytes: &[u8]) -> Option<Self>;
}

/// One inventory slot as the game reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item type; 0 means the slot is empty.
    pub id: i32,
    pub count: i32,
    #[serde(rename = "slotIdx")]
    pub slot_idx: u8,
    #[serde(default)]
    pub ammo: i32,
    #[serde(default)]
    pub decay: i32,
}

impl ItemStack {
    pub fn empty_at(slot_idx: u8) -> Self {
        Self {
            slot_idx,
            ..Self::default()
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.id > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backpack {
    pub items: Vec<ItemStack>,
}

impl Backpack {
    pub fn new(items: Vec<ItemStack>) -> Self {
        Self { items }
    }

    /// Places `stacks` in the first slots, renumbering `slot_idx`, and pads
    /// the rest with empty slots. Stacks beyond the last slot are dropped.
    pub fn from_stacks(stacks: &[ItemStack]) -> Self {
        let items = (0..BACKPACK_SLOTS)
            .map(|i| {
                let slot_idx = i as u8;
                match stacks.get(i) {
                    Some(stack) => ItemStack { slot_idx, ..*stack },
                    None => ItemStack::empty_at(slot_idx),
                }
            })
            .collect();
        Self { items }
    }

    /// Builds a full backpack from what an inventory window reported,
    /// keeping every stack at its own `slot_idx`. Out-of-range and
    /// duplicate slots are dropped.
    pub fn from_slots(stacks: Vec<ItemStack>) -> Self {
        let mut backpack = Self::empty();
        for stack in stacks {
            let idx = usize::from(stack.slot_idx);
            if idx < BACKPACK_SLOTS && !backpack.items[idx].is_occupied() {
                backpack.items[idx] = stack;
            }
        }
        backpack
    }
}

impl StoredRecord for Backpack {
    fn empty() -> Self {
        Self::from_stacks(&[])
    }

    fn slot_count(&self) -> usize {
        self.items.len()
    }

    fn occupied(&self) -> usize {
        self.items.iter().filter(|i| i.is_occupied()).count()
    }

    /// Keeps every item object inside the `items` array that still parses,
    /// at its own `slotIdx`. `None` if nothing could be kept.
    fn salvage(bytes: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(bytes);
        let start = text.find("\"items\"")?;
        let array = start + text[start..].find('[')?;

        let mut backpack = Self::empty();
        let mut kept = 0;
        for object in brace_objects(&text[array..]) {
            let Ok(stack) = serde_json::from_str::<ItemStack>(object) else {
                continue;
            };
            let idx = usize::from(stack.slot_idx);
            if !stack.is_occupied() || idx >= BACKPACK_SLOTS || backpack.items[idx].is_occupied() {
                continue;
            }
            backpack.items[idx] = stack;
            kept += 1;
        }

        debug!("Salvaged {} item stack(s)", kept);
        (kept > 0).then_some(backpack)
    }
}

/// Top-level `{...}` spans in `text`, stopping at the first unmatched `]`.
fn brace_objects(text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(&text[s..=i]);
                    }
                }
            }
            ']' if depth == 0 => break,
            _ => {}
        }
    }
    objects
}
