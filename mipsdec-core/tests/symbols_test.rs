// Unit tests for symbol table parsing and lookup
#[cfg(test)]
mod tests {
    use mipsdec_core::decompiler::{DecompilerError, SymbolTable};
    use std::path::Path;

    const MAP: &str = "80001000 T main\n\
                       80001000 T main_alias\n\
                       80001040 t helper\n\
                       80002000 D data_start\n";

    #[test]
    fn test_parse_and_lookup() {
        let symbols = SymbolTable::parse(MAP).unwrap();
        assert_eq!(symbols.len(), 4);
        assert_eq!(symbols.lookup_name("helper"), Some(0x8000_1040));
        assert_eq!(symbols.lookup_name("missing"), None);

        // Aliases resolve to the first name at the address
        assert_eq!(symbols.lookup_address(0x8000_1000), Some("main"));
        assert_eq!(symbols.lookup_address(0x8000_1004), None);

        let helper = symbols.iter().find(|symbol| symbol.name == "helper").unwrap();
        assert_eq!(helper.kind, 't');
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let symbols = SymbolTable::parse("\r\n80000000 T a\r\n\n80000010 T b\r\n").unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols.lookup_address(0x8000_0010), Some("b"));
    }

    #[test]
    fn test_unsorted_input_is_ordered() {
        let symbols = SymbolTable::parse("80000020 T late\n80000000 T early\n").unwrap();
        assert_eq!(symbols.entry_at(0).map(|symbol| symbol.name.as_str()), Some("early"));
        assert_eq!(symbols.function_range("early").unwrap(), (0x8000_0000, 0x8000_0020));
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let err = SymbolTable::parse("80000000 T ok\nnot a symbol line\n").unwrap_err();
        match err {
            DecompilerError::SymbolParse { line_number, line, .. } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "not a symbol line");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_function_range_skips_aliases() {
        let symbols = SymbolTable::parse(MAP).unwrap();
        assert_eq!(symbols.function_range("main").unwrap(), (0x8000_1000, 0x8000_1040));
        assert_eq!(symbols.function_range("main_alias").unwrap(), (0x8000_1000, 0x8000_1040));
        assert_eq!(symbols.function_range("helper").unwrap(), (0x8000_1040, 0x8000_2000));
    }

    #[test]
    fn test_function_range_errors() {
        let symbols = SymbolTable::parse(MAP).unwrap();
        assert!(matches!(
            symbols.function_range("nope"),
            Err(DecompilerError::SymbolNotFound { ref name, .. }) if name == "nope"
        ));
        assert!(matches!(
            symbols.function_range("data_start"),
            Err(DecompilerError::UnboundedFunction { address: 0x8000_2000, .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = SymbolTable::from_file(Path::new("/nonexistent/mipsdec/symbols.map"));
        assert!(matches!(result, Err(DecompilerError::Io { .. })));
    }
}
