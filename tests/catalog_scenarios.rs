//! End-to-end catalog scenarios through the public API

use libris_rs::{Book, BookStatus, Catalog, CatalogConfig, CatalogError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn dune() -> Book {
    Book::new("Dune", "1000000000000", "SciFi", 1965, "Herbert")
}

fn shelf(count: usize) -> Vec<Book> {
    let genres = ["Classic", "Fantasy", "History", "SciFi"];
    (0..count)
        .map(|i| {
            Book::new(
                format!("Volume {:04}", i),
                format!("978{:010}", i),
                genres[i % genres.len()],
                1950 + (i % 70) as i32,
                format!("Author {}", i % 13),
            )
        })
        .collect()
}

#[test]
fn test_dune_visible_everywhere_then_nowhere() {
    let mut catalog = Catalog::new();
    catalog.insert(dune()).unwrap();

    assert!(catalog.get_by_title("Dune").is_some());
    assert!(catalog.get_by_isbn("1000000000000").is_some());
    assert_eq!(catalog.find_by_genre("SciFi").len(), 1);
    assert_eq!(catalog.find_in_years(1960, 1970).len(), 1);

    catalog.remove("1000000000000").unwrap();

    assert!(catalog.get_by_title("Dune").is_none());
    assert!(catalog.get_by_isbn("1000000000000").is_none());
    assert!(catalog.find_by_genre("SciFi").is_empty());
    assert!(catalog.find_in_years(1960, 1970).is_empty());
    assert!(catalog.is_empty());
}

#[test]
fn test_duplicate_isbn_keeps_size() {
    let mut catalog = Catalog::new();
    catalog.insert(dune()).unwrap();

    let copy = Book::new("Children of Dune", "1000000000000", "SciFi", 1976, "Herbert");
    let err = catalog.insert(copy).unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateIsbn(ref isbn) if isbn == "1000000000000"));
    assert!(!err.is_validation());
    assert_eq!(catalog.len(), 1);
}

#[test]
fn test_thirteen_books_rehash_once() {
    let config = CatalogConfig {
        hash_initial_capacity: 17,
        ..CatalogConfig::default()
    };
    let mut catalog = Catalog::with_config(config).unwrap();

    for book in shelf(12) {
        catalog.insert(book).unwrap();
    }
    assert_eq!(catalog.hash_statistics().capacity, 17);

    catalog.insert(dune()).unwrap();
    let stats = catalog.hash_statistics();
    assert_eq!(stats.capacity, 37);
    assert_eq!(stats.rehashes, 1);
    assert!(stats.load_factor <= 0.75);
}

#[test]
fn test_tiny_isbn_index_with_low_load_factor() {
    let config = CatalogConfig {
        hash_initial_capacity: 2,
        hash_max_load_factor: 0.1,
        ..CatalogConfig::default()
    };
    let mut catalog = Catalog::with_config(config).unwrap();

    catalog.insert(dune()).unwrap();
    let stats = catalog.hash_statistics();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.capacity, 11);
    assert!(stats.load_factor <= 0.1);

    for book in shelf(30) {
        catalog.insert(book).unwrap();
        assert!(catalog.hash_statistics().load_factor <= 0.1);
    }
    assert_eq!(catalog.len(), 31);
    assert!(catalog.get_by_title("Dune").is_some());
    assert!(catalog.check_invariants().is_ok());
}

#[test]
fn test_shuffled_workload_stays_consistent() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut books = shelf(500);
    books.shuffle(&mut rng);

    let mut catalog = Catalog::new();
    assert_eq!(catalog.insert_all(books.clone()), 500);
    assert!(catalog.check_invariants().is_ok());

    let titles = catalog.titles();
    assert!(titles.windows(2).all(|w| w[0] < w[1]));

    books.shuffle(&mut rng);
    for book in books.iter().take(250) {
        assert!(catalog.remove(&book.isbn).unwrap().is_some());
    }

    assert_eq!(catalog.len(), 250);
    assert!(catalog.check_invariants().is_ok());
    for book in books.iter().skip(250) {
        assert_eq!(catalog.get_by_title(&book.title).map(|b| &b.isbn), Some(&book.isbn));
    }
}

#[test]
fn test_year_range_is_sorted_and_inclusive() {
    let mut catalog = Catalog::new();
    catalog.insert_all(shelf(140));

    let found = catalog.find_in_years(1960, 1964);
    assert_eq!(found.len(), 10);
    assert!(found.windows(2).all(|w| w[0].year <= w[1].year));
    assert_eq!(found.first().map(|b| b.year), Some(1960));
    assert_eq!(found.last().map(|b| b.year), Some(1964));

    assert!(catalog.find_in_years(1964, 1960).is_empty());
}

#[test]
fn test_counts_by_genre_and_year() {
    let mut catalog = Catalog::new();
    catalog.insert_all(shelf(40));

    let genres = catalog.genre_counts();
    assert_eq!(
        genres,
        vec![
            ("Classic".to_string(), 10),
            ("Fantasy".to_string(), 10),
            ("History".to_string(), 10),
            ("SciFi".to_string(), 10),
        ]
    );

    let years = catalog.year_counts();
    assert_eq!(years.len(), 40);
    assert_eq!(years.values().sum::<usize>(), 40);
}

#[test]
fn test_status_changes_are_visible_through_every_index() {
    let mut catalog = Catalog::new();
    catalog.insert(dune()).unwrap();
    catalog.update_status("1000000000000", BookStatus::OutOfStock).unwrap();

    assert_eq!(catalog.get_by_title("Dune").unwrap().status, BookStatus::OutOfStock);
    assert_eq!(catalog.find_by_genre("SciFi")[0].status, BookStatus::OutOfStock);
    assert_eq!(catalog.find_by_year(1965)[0].status, BookStatus::OutOfStock);
}

#[test]
fn test_traversal_surfaces() {
    let mut catalog = Catalog::new();
    catalog.insert_all(shelf(60));

    let nodes = catalog.year_index().nodes();
    assert_eq!(nodes[0].depth, 0);
    assert!(nodes.iter().all(|n| n.depth < catalog.year_index().height()));

    let leaves = catalog.genre_index().leaf_chain();
    assert_eq!(leaves.concat(), vec!["Classic", "Fantasy", "History", "SciFi"]);

    let buckets = catalog.isbn_index().buckets();
    assert_eq!(buckets.len(), catalog.hash_statistics().capacity);
    assert_eq!(buckets.iter().sum::<usize>(), 60);

    assert!(catalog.title_index().root_key().is_some());
}
