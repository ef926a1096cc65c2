//! Separate-chaining hash table for the ISBN index
//!
//! Hashing is two-stage: a base-31 polynomial over the key's characters,
//! then a multiplicative (Fibonacci) step that keeps the fractional part
//! of `poly * φ⁻¹` and scales it by the capacity.
//!
//! Capacity is always prime. When an insert pushes the load factor past
//! the configured maximum, the table doubles, rounds up to the next prime
//! and reinserts every entry in one pass.

use crate::core::record::Identity;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fractional part of the golden ratio, (√5 - 1) / 2
const GOLDEN_FRACTION: f64 = 0.618_033_988_749_894_8;

/// Default load factor ceiling
pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.75;

type Chain<V> = Option<Box<ChainNode<V>>>;

#[derive(Debug, Clone)]
struct ChainNode<V> {
    key: String,
    value: V,
    next: Chain<V>,
}

/// Occupancy statistics of a [`HashTable`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashStats {
    pub capacity: usize,
    pub count: usize,
    pub load_factor: f64,
    /// Entries that landed in an already occupied bucket since the last rehash
    pub collisions: usize,
    pub longest_chain: usize,
    pub empty_buckets: usize,
    pub rehashes: usize,
}

pub fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Smallest prime >= n
pub fn next_prime(n: usize) -> usize {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

/// Bucket index of `key` in a table of `capacity` buckets
pub fn bucket_index(key: &str, capacity: usize) -> usize {
    let poly = key
        .chars()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32));
    let fraction = (f64::from(poly) * GOLDEN_FRACTION).fract();
    ((capacity as f64 * fraction) as usize).min(capacity - 1)
}

/// ISBN-keyed chained hash table
#[derive(Debug, Clone)]
pub struct HashTable<V> {
    buckets: Vec<Chain<V>>,
    count: usize,
    collisions: usize,
    rehashes: usize,
    max_load_factor: f64,
}

impl<V: Identity> HashTable<V> {
    /// Create a table with the next prime >= `capacity` buckets
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_load_factor(capacity, DEFAULT_MAX_LOAD_FACTOR)
    }

    pub fn with_load_factor(capacity: usize, max_load_factor: f64) -> Self {
        let capacity = next_prime(capacity);
        HashTable {
            buckets: empty_buckets(capacity),
            count: 0,
            collisions: 0,
            rehashes: 0,
            max_load_factor,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn load_factor(&self) -> f64 {
        self.count as f64 / self.capacity() as f64
    }

    /// Insert under the value's ISBN; false if that ISBN is already present
    pub fn insert(&mut self, value: V) -> bool {
        let key = value.isbn().to_string();
        if self.search(&key).is_some() {
            return false;
        }

        let idx = bucket_index(&key, self.capacity());
        self.push_front(idx, key, value);
        self.count += 1;

        // A small max load factor may need more than one doubling
        while self.load_factor() > self.max_load_factor {
            self.rehash();
        }

        debug_assert!(
            self.load_factor() <= self.max_load_factor,
            "load factor {} above {} after insert",
            self.load_factor(),
            self.max_load_factor
        );
        true
    }

    fn push_front(&mut self, idx: usize, key: String, value: V) {
        let head = &mut self.buckets[idx];
        if head.is_some() {
            self.collisions += 1;
        }
        let next = head.take();
        *head = Some(Box::new(ChainNode { key, value, next }));
    }

    /// Grow to the next prime >= twice the capacity and reinsert everything
    fn rehash(&mut self) {
        let old_capacity = self.capacity();
        let new_capacity = next_prime(old_capacity * 2);
        let old = std::mem::replace(&mut self.buckets, empty_buckets(new_capacity));

        self.collisions = 0;
        for mut chain in old {
            while let Some(node) = chain {
                let ChainNode { key, value, next } = *node;
                let idx = bucket_index(&key, new_capacity);
                self.push_front(idx, key, value);
                chain = next;
            }
        }

        self.rehashes += 1;
        debug!(
            "Rehashed ISBN index from {} to {} buckets ({} entries)",
            old_capacity, new_capacity, self.count
        );
    }

    pub fn search(&self, isbn: &str) -> Option<&V> {
        let mut node = self.buckets[bucket_index(isbn, self.capacity())].as_deref();
        while let Some(n) = node {
            if n.key == isbn {
                return Some(&n.value);
            }
            node = n.next.as_deref();
        }
        None
    }

    pub fn contains(&self, isbn: &str) -> bool {
        self.search(isbn).is_some()
    }

    pub fn delete(&mut self, isbn: &str) -> bool {
        self.remove(isbn).is_some()
    }

    pub fn remove(&mut self, isbn: &str) -> Option<V> {
        let idx = bucket_index(isbn, self.capacity());
        let head = &mut self.buckets[idx];

        if head.as_ref().map_or(false, |n| n.key == isbn) {
            let ChainNode { value, next, .. } = *head.take()?;
            *head = next;
            self.count -= 1;
            return Some(value);
        }

        let mut current = head.as_mut()?;
        loop {
            if current.next.as_ref().map_or(false, |n| n.key == isbn) {
                let ChainNode { value, next, .. } = *current.next.take()?;
                current.next = next;
                self.count -= 1;
                return Some(value);
            }
            current = current.next.as_mut()?;
        }
    }

    /// Chain length of every bucket, for renderers
    pub fn buckets(&self) -> Vec<usize> {
        self.buckets.iter().map(chain_len).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.buckets.iter().flat_map(|head| {
            let mut node = head.as_deref();
            std::iter::from_fn(move || {
                let n = node?;
                node = n.next.as_deref();
                Some(&n.value)
            })
        })
    }

    pub fn statistics(&self) -> HashStats {
        let lengths = self.buckets();
        HashStats {
            capacity: self.capacity(),
            count: self.count,
            load_factor: self.load_factor(),
            collisions: self.collisions,
            longest_chain: lengths.iter().copied().max().unwrap_or(0),
            empty_buckets: lengths.iter().filter(|&&l| l == 0).count(),
            rehashes: self.rehashes,
        }
    }

    /// Verify prime capacity, the load bound and that every key hashes home
    pub fn check_invariants(&self) -> Result<(), String> {
        if !is_prime(self.capacity()) {
            return Err(format!("capacity {} is not prime", self.capacity()));
        }
        if self.load_factor() > self.max_load_factor {
            return Err(format!("load factor {} too high", self.load_factor()));
        }

        let mut seen = 0;
        for (idx, head) in self.buckets.iter().enumerate() {
            let mut node = head.as_deref();
            while let Some(n) = node {
                if bucket_index(&n.key, self.capacity()) != idx {
                    return Err(format!("key {} filed in wrong bucket {}", n.key, idx));
                }
                seen += 1;
                node = n.next.as_deref();
            }
        }

        if seen != self.count {
            return Err(format!("count {} but {} chained entries", self.count, seen));
        }
        Ok(())
    }
}

fn empty_buckets<V>(capacity: usize) -> Vec<Chain<V>> {
    std::iter::repeat_with(|| None).take(capacity).collect()
}

fn chain_len<V>(head: &Chain<V>) -> usize {
    let mut len = 0;
    let mut node = head.as_deref();
    while let Some(n) = node {
        len += 1;
        node = n.next.as_deref();
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Book;

    fn book(n: usize) -> Book {
        Book::new(format!("title{}", n), format!("978{:010}", n), "Genre", 2000, "Author")
    }

    #[test]
    fn test_primes() {
        assert_eq!(next_prime(0), 2);
        assert_eq!(next_prime(17), 17);
        assert_eq!(next_prime(18), 19);
        assert_eq!(next_prime(34), 37);
        assert!(!is_prime(1));
        assert!(!is_prime(91));
    }

    #[test]
    fn test_bucket_index_in_range() {
        for cap in [2, 17, 37, 1009] {
            for n in 0..200 {
                assert!(bucket_index(&format!("978{:010}", n), cap) < cap);
            }
        }
        assert_eq!(bucket_index("", 17), 0);
    }

    #[test]
    fn test_capacity_is_rounded_to_prime() {
        let table: HashTable<Book> = HashTable::with_capacity(20);
        assert_eq!(table.capacity(), 23);
    }

    #[test]
    fn test_insert_search_delete() {
        let mut table = HashTable::with_capacity(17);
        let dune = Book::new("Dune", "1000000000000", "SciFi", 1965, "Herbert");

        assert!(table.insert(dune.clone()));
        assert!(!table.insert(dune.clone()));
        assert_eq!(table.search("1000000000000"), Some(&dune));

        assert!(table.delete("1000000000000"));
        assert!(table.search("1000000000000").is_none());
        assert!(!table.delete("1000000000000"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_thirteen_inserts_rehash_once_to_37() {
        let mut table = HashTable::with_capacity(17);

        for n in 0..12 {
            assert!(table.insert(book(n)));
        }
        assert_eq!(table.capacity(), 17);
        assert_eq!(table.statistics().rehashes, 0);

        // 13 / 17 = 0.76 > 0.75
        assert!(table.insert(book(12)));
        let stats = table.statistics();
        assert_eq!(stats.capacity, 37);
        assert_eq!(stats.rehashes, 1);
        assert_eq!(stats.count, 13);
        assert!(stats.load_factor <= 0.75);

        for n in 0..13 {
            assert!(table.contains(&book(n).isbn));
        }
        assert!(table.check_invariants().is_ok());
    }

    #[test]
    fn test_small_load_factor_grows_until_bounded() {
        let mut table = HashTable::with_load_factor(2, 0.1);
        assert!(table.insert(book(1)));

        // 1/2 -> 1/5 -> 1/11
        assert_eq!(table.capacity(), 11);
        assert_eq!(table.statistics().rehashes, 2);
        assert!(table.load_factor() <= 0.1);

        for n in 2..40 {
            assert!(table.insert(book(n)));
            assert!(table.load_factor() <= 0.1);
            assert!(is_prime(table.capacity()));
        }
        assert!(table.check_invariants().is_ok());
    }

    #[test]
    fn test_chain_removal_from_middle_and_tail() {
        // Capacity 2 forces long chains before the first rehash
        let mut table = HashTable::with_load_factor(2, 1.0);
        for n in 0..2 {
            table.insert(book(n));
        }
        for n in 0..2 {
            assert!(table.delete(&book(n).isbn));
        }
        assert!(table.is_empty());

        let mut table = HashTable::with_capacity(3);
        for n in 0..100 {
            table.insert(book(n));
        }
        for n in (0..100).filter(|n| n % 3 == 1) {
            assert!(table.delete(&book(n).isbn));
        }
        for n in 0..100 {
            assert_eq!(table.contains(&book(n).isbn), n % 3 != 1);
        }
        assert!(table.check_invariants().is_ok());
        assert_eq!(table.iter().count(), table.len());
    }

    #[test]
    fn test_statistics() {
        let mut table = HashTable::with_capacity(101);
        for n in 0..50 {
            table.insert(book(n));
        }
        let stats = table.statistics();
        assert_eq!(stats.count, 50);
        assert_eq!(stats.capacity, 101);
        assert!(stats.longest_chain >= 1);
        assert_eq!(stats.empty_buckets + table.buckets().iter().filter(|&&l| l > 0).count(), 101);
        assert_eq!(table.buckets().iter().sum::<usize>(), 50);
    }
}
