pub mod writable_file;
