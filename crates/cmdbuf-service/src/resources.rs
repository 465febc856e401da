//! Client id -> service object tables, one per [`IdNamespace`].

use std::collections::BTreeMap;

use cmdbuf_protocol::gl::GLenum;
use cmdbuf_protocol::IdNamespace;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Handle of the object in the native API.
    pub service_id: u32,
    /// Target of the first bind, `0` until bound. Objects without bind targets keep `0`.
    pub target: GLenum,
    /// Set once the object has been bound; `Is*` queries report `false` until then.
    pub bound: bool,
}

impl ObjectEntry {
    pub fn new(service_id: u32) -> Self {
        Self {
            service_id,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceTables {
    tables: [BTreeMap<u32, ObjectEntry>; IdNamespace::COUNT],
}

impl ResourceTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ns: IdNamespace, client_id: u32) -> Option<&ObjectEntry> {
        self.tables[ns.index()].get(&client_id)
    }

    pub fn get_mut(&mut self, ns: IdNamespace, client_id: u32) -> Option<&mut ObjectEntry> {
        self.tables[ns.index()].get_mut(&client_id)
    }

    pub fn contains(&self, ns: IdNamespace, client_id: u32) -> bool {
        self.tables[ns.index()].contains_key(&client_id)
    }

    pub fn service_id(&self, ns: IdNamespace, client_id: u32) -> Option<u32> {
        self.get(ns, client_id).map(|e| e.service_id)
    }

    /// Inserts a new mapping. Returns `false` (and leaves the table untouched) if `client_id` is
    /// already in use.
    pub fn insert(&mut self, ns: IdNamespace, client_id: u32, entry: ObjectEntry) -> bool {
        let table = &mut self.tables[ns.index()];
        if table.contains_key(&client_id) {
            return false;
        }
        table.insert(client_id, entry);
        true
    }

    pub fn remove(&mut self, ns: IdNamespace, client_id: u32) -> Option<ObjectEntry> {
        self.tables[ns.index()].remove(&client_id)
    }

    pub fn len(&self, ns: IdNamespace) -> usize {
        self.tables[ns.index()].len()
    }

    pub fn client_ids(&self, ns: IdNamespace) -> impl Iterator<Item = u32> + '_ {
        self.tables[ns.index()].keys().copied()
    }
}
