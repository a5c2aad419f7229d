//! Resource record storage: an arena of parsed/added records addressed by
//! stable index handles, instead of the linked list the original C++ layer
//! used (spec.md §9 redesign note — a `Vec` arena gives O(1) lookup and
//! avoids lifetime gymnastics an intrusive list would need in Rust).

use bytes::Bytes;

use super::types::{QClass, QType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Question,
        Section::Answer,
        Section::Authority,
        Section::Additional,
    ];

    /// Byte offset of this section's 16-bit count field within the header.
    pub fn count_offset(self) -> usize {
        match self {
            Section::Question => 4,
            Section::Answer => 6,
            Section::Authority => 8,
            Section::Additional => 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub section: Section,
    pub name: String,
    pub rtype: QType,
    pub rclass: QClass,
    /// 0 for question records, which carry no TTL/rdata.
    pub ttl: u32,
    pub rdata: Bytes,
    /// Byte offset and length of this record within the layer's wire buffer.
    /// `0` length marks a record that was never on the wire (rare: only
    /// possible for a record added and not yet serialized, which the arena
    /// never actually holds since `add_resource` serializes immediately).
    pub wire_offset: usize,
    pub wire_size: usize,
}

/// Stable handle into a `DnsLayer`'s resource arena. Indices are never
/// reused after `remove_resource`, so a handle either still points at the
/// record it named or is dead — it never silently points at a different one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub(super) usize);

#[derive(Debug, Default)]
pub struct ResourceArena {
    slots: Vec<Option<ResourceRecord>>,
    /// Per-section ordering of live handles, in wire order.
    order: [Vec<usize>; 4],
}

impl ResourceArena {
    pub fn clear(&mut self) {
        self.slots.clear();
        for section in &mut self.order {
            section.clear();
        }
    }

    pub fn push(&mut self, record: ResourceRecord) -> ResourceHandle {
        let section_idx = section_index(record.section);
        let idx = self.slots.len();
        self.order[section_idx].push(idx);
        self.slots.push(Some(record));
        ResourceHandle(idx)
    }

    pub fn get(&self, handle: ResourceHandle) -> Option<&ResourceRecord> {
        self.slots.get(handle.0).and_then(|slot| slot.as_ref())
    }

    pub fn remove(&mut self, handle: ResourceHandle) -> Option<ResourceRecord> {
        let record = self.slots.get_mut(handle.0)?.take()?;
        let section_idx = section_index(record.section);
        self.order[section_idx].retain(|&idx| idx != handle.0);
        Some(record)
    }

    pub fn section(&self, section: Section) -> impl Iterator<Item = (ResourceHandle, &ResourceRecord)> {
        self.order[section_index(section)]
            .iter()
            .filter_map(move |&idx| self.slots[idx].as_ref().map(|r| (ResourceHandle(idx), r)))
    }

    pub fn first(&self, section: Section) -> Option<(ResourceHandle, &ResourceRecord)> {
        self.section(section).next()
    }

    pub fn count(&self, section: Section) -> usize {
        self.order[section_index(section)].len()
    }

    pub fn total_count(&self) -> usize {
        self.order.iter().map(|o| o.len()).sum()
    }

    /// Shifts `wire_offset` of every live record starting at or after
    /// `from` by `delta`, used after a splice grows or shrinks the buffer.
    pub fn shift_offsets_from(&mut self, from: usize, delta: i64) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.wire_offset >= from {
                slot.wire_offset = (slot.wire_offset as i64 + delta) as usize;
            }
        }
    }
}

fn section_index(section: Section) -> usize {
    match section {
        Section::Question => 0,
        Section::Answer => 1,
        Section::Authority => 2,
        Section::Additional => 3,
    }
}
