pub mod cigar_parser;
pub mod comparator;
pub mod errors;
pub mod fasta_reader;
pub mod md_parser;
pub mod mismatch;
pub mod pipeline;
pub mod record;
pub mod walker;
