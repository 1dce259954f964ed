// The symbol-table collaborator. The decoder and simulator
// never touch this directly; only `disasm` and the demo binary do, through
// the `Symbols` trait, so a caller can swap in whatever storage engine it
// already has.

use std::collections::BTreeMap;

/// Anything that can map names to addresses and back. `Symbols` is an
/// external collaborator, not a concrete data structure owned by the core
/// crate: `disasm::format_operand` takes `&dyn Symbols` so a caller backed
/// by a real persistent symbol store can plug straight in.
pub trait Symbols {
    fn define(&mut self, name: &str, addr: u32);
    fn resolve(&self, name: &str) -> Option<u32>;
    fn lookup(&self, addr: u32) -> Option<&str>;
    fn delete(&mut self, name: &str) -> bool;
    fn clear(&mut self);
    fn enumerate(&self) -> Vec<(&str, u32)>;
}

/// A minimal in-memory table, adequate for tests and the demo binary. Real
/// deployments are expected to bring their own `Symbols` implementation
/// backed by whatever persistent store they already maintain.
#[derive(Debug, Default)]
pub struct MemTable {
    by_name: BTreeMap<String, u32>,
    by_addr: BTreeMap<u32, String>,
}

impl MemTable {
    pub fn new() -> Self {
        MemTable::default()
    }
}

impl Symbols for MemTable {
    fn define(&mut self, name: &str, addr: u32) {
        if let Some(old) = self.by_name.insert(name.to_string(), addr) {
            if self.by_addr.get(&old).map(|n| n.as_str()) == Some(name) {
                self.by_addr.remove(&old);
            }
        }
        self.by_addr.insert(addr, name.to_string());
    }

    fn resolve(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    fn lookup(&self, addr: u32) -> Option<&str> {
        self.by_addr.get(&addr).map(|s| s.as_str())
    }

    fn delete(&mut self, name: &str) -> bool {
        if let Some(addr) = self.by_name.remove(name) {
            if self.by_addr.get(&addr).map(|n| n.as_str()) == Some(name) {
                self.by_addr.remove(&addr);
            }
            true
        } else {
            false
        }
    }

    fn clear(&mut self) {
        self.by_name.clear();
        self.by_addr.clear();
    }

    fn enumerate(&self) -> Vec<(&str, u32)> {
        self.by_name.iter().map(|(n, a)| (n.as_str(), *a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_resolve_and_lookup_roundtrip() {
        let mut t = MemTable::new();
        t.define("reset_vec", 0xfffe);
        assert_eq!(t.resolve("reset_vec"), Some(0xfffe));
        assert_eq!(t.lookup(0xfffe), Some("reset_vec"));
    }

    #[test]
    fn redefining_a_name_drops_the_old_reverse_entry() {
        let mut t = MemTable::new();
        t.define("foo", 0x200);
        t.define("foo", 0x300);
        assert_eq!(t.lookup(0x200), None);
        assert_eq!(t.lookup(0x300), Some("foo"));
        assert_eq!(t.resolve("foo"), Some(0x300));
    }

    #[test]
    fn delete_removes_both_directions() {
        let mut t = MemTable::new();
        t.define("bar", 0x400);
        assert!(t.delete("bar"));
        assert!(!t.delete("bar"));
        assert_eq!(t.resolve("bar"), None);
        assert_eq!(t.lookup(0x400), None);
    }

    #[test]
    fn clear_empties_both_maps() {
        let mut t = MemTable::new();
        t.define("a", 1);
        t.define("b", 2);
        t.clear();
        assert!(t.enumerate().is_empty());
    }
}
