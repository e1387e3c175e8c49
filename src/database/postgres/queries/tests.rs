use super::*;
use crate::database::models::{Metadata, MetadataFilter};
use sqlx::{Arguments, Execute};

fn table() -> TableName {
    TableName::parse("crawled_pages").expect("table should parse")
}

fn query(filter: MetadataFilter) -> SimilarityQuery {
    SimilarityQuery {
        embedding: vec![0.1, 0.2, 0.3],
        match_count: 5,
        filter,
    }
}

fn chunk_row(url: &str, chunk_number: i32) -> ChunkRow {
    ChunkRow {
        url: url.to_string(),
        chunk_number,
        content: "text".to_string(),
        embedding: vec![0.1, 0.2, 0.3],
        metadata: Metadata::new(),
    }
}

#[test]
fn unfiltered_similarity_statement() {
    let statement = ChunkQueries::similarity_statement(&table(), &query(MetadataFilter::none()));
    assert_eq!(
        statement.sql(),
        "SELECT url, content, metadata, 1 - (embedding <=> $1) AS similarity \
         FROM \"crawled_pages\" ORDER BY embedding <=> $2 LIMIT $3"
    );
}

#[test]
fn filtered_similarity_statement() {
    let statement =
        ChunkQueries::similarity_statement(&table(), &query(MetadataFilter::by_source("wiki")));
    assert_eq!(
        statement.sql(),
        "SELECT url, content, metadata, 1 - (embedding <=> $1) AS similarity \
         FROM \"crawled_pages\" WHERE metadata->>'source' = $2 \
         ORDER BY embedding <=> $3 LIMIT $4"
    );
}

#[test]
fn insert_statement_has_one_tuple_per_row() {
    let rows = vec![chunk_row("docA", 0), chunk_row("docA", 1)];
    let statement = ChunkQueries::insert_statement(&table(), &rows);
    assert_eq!(
        statement.sql(),
        "INSERT INTO \"crawled_pages\" (url, chunk_number, content, embedding, metadata) \
         VALUES ($1, $2, $3, $4, $5), ($6, $7, $8, $9, $10)"
    );
}

#[test]
fn rows_per_insert_respects_bind_limit() {
    assert_eq!(rows_per_insert(0), 1);
    assert_eq!(rows_per_insert(20), 20);
    assert_eq!(rows_per_insert(20_000), MAX_ROWS_PER_INSERT);
    assert_eq!(rows_per_insert(usize::MAX), MAX_ROWS_PER_INSERT);
}

#[test]
fn largest_insert_fits_bind_limit() {
    let rows: Vec<ChunkRow> = (0..20_000)
        .map(|n| chunk_row("docA", n))
        .collect();
    let slice = rows
        .chunks(rows_per_insert(20_000))
        .next()
        .expect("rows should produce a slice");

    let mut statement = ChunkQueries::insert_statement(&table(), slice);
    let mut query = statement.build();
    let arguments = query
        .take_arguments()
        .expect("arguments should encode")
        .expect("statement should carry arguments");

    assert_eq!(slice.len(), MAX_ROWS_PER_INSERT);
    assert!(arguments.len() <= MAX_BIND_PARAMETERS);
    assert_eq!(arguments.len(), MAX_ROWS_PER_INSERT * 5);
}
