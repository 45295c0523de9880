use crate::error::{Error, ErrorKind};
use crate::{assemble, assemble_with, Config, Diagnostic, Output, SourceLoader};
use std::collections::HashMap;


fn output(source: &str) -> Output {
    match assemble(source) {
        Ok(output) => output,
        Err(err) => panic!("assembly failed:\n{}", err),
    }
}

fn image(source: &str) -> Vec<u8> {
    output(source).image.data().to_vec()
}

fn errors(source: &str) -> Vec<Diagnostic> {
    match assemble(source) {
        Err(Error::Assembly(diagnostics)) => diagnostics,
        Ok(_) => panic!("assembly unexpectedly succeeded"),
        Err(other) => panic!("expected recoverable errors, got:\n{}", other),
    }
}

/// Supplies INCLUDE/INCLUDEBIN content from memory.
struct MapLoader {
    sources: HashMap<&'static str, &'static str>,
    binaries: HashMap<&'static str, Vec<u8>>,
}

impl MapLoader {
    fn new() -> MapLoader {
        MapLoader {
            sources: HashMap::new(),
            binaries: HashMap::new(),
        }
    }
}

impl SourceLoader for MapLoader {
    fn load_source(&self, name: &str) -> std::io::Result<String> {
        self.sources
            .get(name)
            .map(|s| (*s).to_owned())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, name.to_owned()))
    }

    fn load_binary(&self, name: &str) -> std::io::Result<Vec<u8>> {
        self.binaries
            .get(name)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, name.to_owned()))
    }
}

#[test]
fn immediate_load() {
    let out = output(
        " ORG $1000
 LDA #$42",
    );
    assert_eq!(out.image.origin(), 0x1000);
    assert_eq!(out.image.data(), &[0x86, 0x42]);
}

#[test]
fn direct_page_selects_the_short_form() {
    let bytes = image(
        " ORG $1000
 SETDP $10
 LDA $1055",
    );
    assert_eq!(bytes, vec![0x96, 0x55]);

    let bytes = image(
        " ORG $1000
 SETDP $20
 LDA $1055",
    );
    assert_eq!(bytes, vec![0xB6, 0x10, 0x55]);
}

#[test]
fn backward_branch() {
    let bytes = image(
        " ORG $1000
loop NOP
 BRA loop",
    );
    assert_eq!(bytes, vec![0x12, 0x20, 0xFD]);
}

#[test]
fn forward_reference_resolves_on_the_second_pass() {
    let bytes = image(
        " ORG $1000
 BRA skip
 NOP
skip NOP",
    );
    assert_eq!(bytes, vec![0x20, 0x01, 0x12, 0x12]);
}

#[test]
fn macro_expansion_substitutes_arguments() {
    let bytes = image(
        "addd MACRO
 ADDA &1
 ADDB &2
 ENDM
 ORG $1000
 addd #1,#2",
    );
    assert_eq!(bytes, vec![0x8B, 0x01, 0xCB, 0x02]);
}

#[test]
fn stack_register_list() {
    let bytes = image(
        " ORG $1000
 PSHS A,B,X",
    );
    assert_eq!(bytes, vec![0x34, 0x16]);
}

#[test]
fn transfer_pair() {
    assert_eq!(image(" TFR D,X"), vec![0x1F, 0x01]);
}

#[test]
fn indexed_auto_increment() {
    assert_eq!(image(" LDA ,X++"), vec![0xA6, 0x81]);
}

#[test]
fn local_labels_resolve_both_directions() {
    let bytes = image(
        " ORG $1000
1 NOP
 BRA 1B",
    );
    assert_eq!(bytes, vec![0x12, 0x20, 0xFD]);

    let bytes = image(
        " ORG $1000
 BRA 1F
1 NOP",
    );
    assert_eq!(bytes, vec![0x20, 0x00, 0x12]);
}

#[test]
fn byte_data_with_strings() {
    assert_eq!(
        image(" FCC \"AB\",0,\"C\""),
        vec![0x41, 0x42, 0x00, 0x43]
    );
}

#[test]
fn word_data_is_big_endian() {
    assert_eq!(image(" FDB $1234,$5678"), vec![0x12, 0x34, 0x56, 0x78]);
}

#[test]
fn reserved_space_pads_the_image() {
    let bytes = image(
        " ORG $1000
 FCB 1
 RMB 2
 FCB 2",
    );
    assert_eq!(bytes, vec![0x01, 0x00, 0x00, 0x02]);
}

#[test]
fn zero_block() {
    assert_eq!(image(" RZB 3"), vec![0, 0, 0]);
}

#[test]
fn equ_and_expressions() {
    let bytes = image(
        "five EQU 5
 FCB five*2, (1+2)*3, %101, @17, 0x1F, 'A",
    );
    assert_eq!(bytes, vec![10, 9, 5, 15, 31, 0x41]);
}

#[test]
fn pc_reference_reads_the_line_address() {
    let bytes = image(
        " ORG $1000
 FDB *",
    );
    assert_eq!(bytes, vec![0x10, 0x00]);
}

#[test]
fn forward_equ_converges_to_the_direct_page() {
    let bytes = image(
        " ORG $1000
 SETDP $00
 LDA target
 NOP
target EQU $0055",
    );
    assert_eq!(bytes, vec![0x96, 0x55, 0x12]);
}

#[test]
fn long_branches() {
    let bytes = image(
        " ORG $1000
 LBRA next
next NOP",
    );
    assert_eq!(bytes, vec![0x16, 0x00, 0x00, 0x12]);
}

#[test]
fn indexed_offsets_through_the_pipeline() {
    assert_eq!(image(" LDA 5,X"), vec![0xA6, 0x05]);
    assert_eq!(image(" LDA 100,X"), vec![0xA6, 0x88, 0x64]);
    assert_eq!(image(" LDA [,X]"), vec![0xA6, 0x94]);
    assert_eq!(image(" LDA [$1234]"), vec![0xA6, 0x9F, 0x12, 0x34]);
    assert_eq!(image(" LEAX 1,Y"), vec![0x30, 0x21]);
    assert_eq!(image(" LDX #$1234"), vec![0x8E, 0x12, 0x34]);
}

#[test]
fn put_redirects_physical_placement() {
    let out = output(
        " ORG $1000
 PUT $2000
 FCB 1",
    );
    assert_eq!(out.image.origin(), 0x2000);
    assert_eq!(out.image.data(), &[0x01]);
}

#[test]
fn sections_resume_their_own_pc() {
    let bytes = image(
        " SECTION code
 ORG $1000
 FCB 1
 SECTION data
 ORG $1003
 FCB 9
 SECTION code
 FCB 2",
    );
    assert_eq!(bytes, vec![0x01, 0x02, 0x00, 0x09]);
}

#[test]
fn later_writes_overwrite_earlier_ones() {
    let bytes = image(
        " ORG $1000
 FCB 1,2,3,4
 ORG $1001
 FCB 9",
    );
    assert_eq!(bytes, vec![0x01, 0x09, 0x03, 0x04]);
}

#[test]
fn exports_report_final_values() {
    let out = output(
        "value EQU $1234
start NOP
 EXPORT value,start",
    );
    assert_eq!(
        out.exports,
        vec![("start".to_owned(), 0x0000), ("value".to_owned(), 0x1234)]
    );
}

#[test]
fn include_assembles_in_place() {
    let mut loader = MapLoader::new();
    loader.sources.insert("lib.s", " FCB 1\n FCB 2");
    let out = assemble_with(
        "main.s",
        " ORG $1000
 FCB 0
 INCLUDE \"lib.s\"
 FCB 3",
        &loader,
        Config::default(),
    )
    .unwrap();
    assert_eq!(out.image.data(), &[0, 1, 2, 3]);
}

#[test]
fn includebin_emits_raw_bytes() {
    let mut loader = MapLoader::new();
    loader.binaries.insert("blob.bin", vec![0xDE, 0xAD]);
    let out = assemble_with(
        "main.s",
        " ORG $1000
 INCLUDEBIN \"blob.bin\"",
        &loader,
        Config::default(),
    )
    .unwrap();
    assert_eq!(out.image.data(), &[0xDE, 0xAD]);
}

#[test]
fn missing_include_is_fatal() {
    let loader = MapLoader::new();
    match assemble_with(
        "main.s",
        " INCLUDE \"gone.s\"",
        &loader,
        Config::default(),
    ) {
        Err(Error::Fatal(diagnostic)) => match diagnostic.kind {
            ErrorKind::FileNotFound(_) => {}
            other => panic!("expected file-not-found, got {:?}", other),
        },
        other => panic!("expected fatal error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn macro_arguments_do_not_leak_across_frames() {
    let bytes = image(
        "inner MACRO
 FCB &1
 ENDM
outer MACRO
 inner 7
 FCB &1
 ENDM
 ORG $1000
 outer 1",
    );
    assert_eq!(bytes, vec![7, 1]);
}

#[test]
fn nested_macro_definitions_capture_verbatim() {
    let bytes = image(
        "outer MACRO
inner MACRO
 FCB 9
 ENDM
 ENDM
 ORG $1000
 outer
 inner",
    );
    // Expanding outer defines inner; invoking inner then emits.
    assert_eq!(bytes, vec![9]);
}

#[test]
fn macro_recursion_hits_the_depth_limit() {
    match assemble(
        "m MACRO
 m
 ENDM
 m",
    ) {
        Err(Error::Fatal(diagnostic)) => match diagnostic.kind {
            ErrorKind::Fatal(_) => {}
            other => panic!("expected fatal kind, got {:?}", other),
        },
        other => panic!("expected fatal error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn macro_redefinition_in_one_pass_is_reported() {
    let diagnostics = errors(
        "m MACRO
 ENDM
m MACRO
 ENDM",
    );
    assert!(diagnostics
        .iter()
        .any(|d| matches!(d.kind, ErrorKind::Syntax(_))));
}

#[test]
fn unknown_opcode_is_a_syntax_error() {
    let diagnostics = errors(" XYZZY #1");
    assert!(matches!(diagnostics[0].kind, ErrorKind::Syntax(_)));
    assert_eq!(diagnostics[0].line, 1);
}

#[test]
fn branch_out_of_range_is_reported() {
    let diagnostics = errors(
        " ORG $1000
 BRA far
far EQU $2000",
    );
    assert!(diagnostics
        .iter()
        .any(|d| matches!(d.kind, ErrorKind::OutOfRange(_))));
}

#[test]
fn division_by_zero_is_reported() {
    let diagnostics = errors(" FCB 1/0");
    assert!(matches!(diagnostics[0].kind, ErrorKind::NumericDomain(_)));
}

#[test]
fn undefined_symbols_only_fail_the_final_pass() {
    let diagnostics = errors(" LDA nowhere");
    assert!(matches!(
        diagnostics[0].kind,
        ErrorKind::UndefinedSymbol(_)
    ));
}

#[test]
fn negative_reservation_is_out_of_range() {
    let diagnostics = errors(" RMB -1");
    assert!(matches!(diagnostics[0].kind, ErrorKind::OutOfRange(_)));
}

#[test]
fn errors_suppress_output_but_accumulate() {
    let diagnostics = errors(
        " LDA nowhere
 XYZZY
 FCB 1/0",
    );
    assert_eq!(diagnostics.len(), 3);
}

#[test]
fn listing_covers_every_line() {
    let out = output(
        " ORG $1000
 LDA #1

label EQU 5",
    );
    assert_eq!(out.listing.len(), 4);
    assert_eq!(out.listing[1].address, Some(0x1000));
    assert_eq!(out.listing[1].bytes, vec![0x86, 0x01]);
    assert_eq!(out.listing[2].address, None);
    assert!(out.listing[2].bytes.is_empty());
    assert_eq!(out.listing[3].address, None);
}

#[test]
fn assembly_is_deterministic() {
    let source = " ORG $1000
 BRA skip
 FCC \"text\"
skip LDX #$1234
 PSHS A,B
 EXPORT skip";
    let first = output(source);
    let second = output(source);
    assert_eq!(first.image, second.image);
    assert_eq!(first.listing, second.listing);
    assert_eq!(first.exports, second.exports);
}

#[test]
fn size_hints_reach_the_encoder() {
    assert_eq!(image(" LDA <$55"), vec![0x96, 0x55]);
    assert_eq!(image(" LDA >$55"), vec![0xB6, 0x00, 0x55]);
}

#[test]
fn interpolated_labels_build_symbols() {
    let bytes = image(
        "def MACRO
val&1 EQU &2
 ENDM
 def 1,$11
 def 2,$22
 FCB val1,val2",
    );
    assert_eq!(bytes, vec![0x11, 0x22]);
}

#[test]
fn empty_argument_slots_emit_zero_bytes() {
    assert_eq!(image(" FCB 1,,2"), vec![1, 0, 2]);
    assert_eq!(image(" FDB ,"), vec![0, 0, 0, 0]);
}
