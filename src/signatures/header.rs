//! Extraction of export signatures from Mono C headers.
//!
//! The parser understands exactly the subset of C that the embedding headers use
//! for `MONO_API` declarations: one prototype per declaration terminated by `;`,
//! decorated with `MONO_*` macros, and parameter types built from keywords,
//! typedef names, `*` and `[]`. Everything else in a header is skipped.
//!
//! # Type mapping
//!
//! | C type | Tag |
//! |--------|-----|
//! | any pointer or array | `pointer` |
//! | enums declared with `typedef enum` | `int` |
//! | `mono_bool`, `gboolean`, `gint*` | `int` |
//! | `guint*`, `mono_unichar2` | `uint` |
//! | `intptr_t`, `ssize_t`, `ptrdiff_t` | `long` |
//! | `uintptr_t`, `size_t`, `gsize` | `size_t` |
//! | `int64_t` / `uint64_t` | `int64` / `uint64` |
//! | other `*_t` integers | `int` / `uint` |
//! | unknown typedefs | `pointer` |
//!
//! # Alias annotations
//!
//! A comment containing `@alias NAME` registers `NAME` as an alternative symbol.
//! When `NAME` ends in `_internal` it belongs to the export with the suffix
//! removed; otherwise it belongs to the next declaration following the comment.
//!
//! # Example
//!
//! ```rust
//! use monoscope::host::NativeType;
//! use monoscope::signatures::header::parse_header;
//!
//! let parsed = parse_header(
//!     "/* @alias mono_thread_attach_internal */\n\
//!      MONO_API MonoThread *mono_thread_attach (MonoDomain *domain);",
//! )?;
//!
//! assert_eq!(parsed.signatures[0].name, "mono_thread_attach");
//! assert_eq!(parsed.signatures[0].params, vec![NativeType::Pointer]);
//! assert_eq!(
//!     parsed.aliases,
//!     vec![("mono_thread_attach".to_string(), "mono_thread_attach_internal".to_string())]
//! );
//! # Ok::<(), monoscope::Error>(())
//! ```

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::{host::NativeType, signatures::ExportSignature, Result};

const DECLARATION_MARKER: &str = "MONO_API";
const ALIAS_MARKER: &str = "@alias";
const INTERNAL_SUFFIX: &str = "_internal";

/// Result of parsing one or more headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedHeader {
    /// Declared exports, sorted by name
    pub signatures: Vec<ExportSignature>,
    /// `(owner, alias)` pairs in annotation order
    pub aliases: Vec<(String, String)>,
}

/// Parses a single header source.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the header contains an unterminated
/// block comment.
pub fn parse_header(source: &str) -> Result<ParsedHeader> {
    let mut parser = HeaderParser::new();
    parser.feed(source)?;
    Ok(parser.finish())
}

/// Incremental parser over several headers.
///
/// Enum typedefs seen in earlier headers are known when later headers are
/// parsed, and the first declaration of a name wins.
#[derive(Debug, Default)]
pub struct HeaderParser {
    enum_types: HashSet<String>,
    signatures: BTreeMap<String, ExportSignature>,
    aliases: Vec<(String, String)>,
}

impl HeaderParser {
    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `source` and accumulates its declarations.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an unterminated block comment.
    pub fn feed(&mut self, source: &str) -> Result<()> {
        let (sanitized, comments) = strip_comments(source)?;
        self.enum_types.extend(collect_enum_types(&sanitized));

        let declarations: Vec<(usize, Declaration)> = find_declarations(&sanitized)
            .into_iter()
            .filter(|(_, decl)| decl.name.starts_with("mono"))
            .collect();

        for (position, text) in &comments {
            for alias in alias_annotations(text) {
                if let Some(owner) = alias.strip_suffix(INTERNAL_SUFFIX) {
                    self.aliases.push((owner.to_string(), alias.to_string()));
                    continue;
                }

                match declarations.iter().find(|(start, _)| start >= position) {
                    Some((_, decl)) => self.aliases.push((decl.name.clone(), alias.to_string())),
                    None => debug!(
                        target: "monoscope::signatures",
                        alias, "alias annotation without a following declaration"
                    ),
                }
            }
        }

        for (_, decl) in declarations {
            let ret = map_native_type(&normalize_type(&decl.return_type), &self.enum_types);
            let params = decl
                .parameters
                .iter()
                .map(|param| map_native_type(&normalize_type(param), &self.enum_types))
                .collect();

            self.signatures
                .entry(decl.name.clone())
                .or_insert_with(|| ExportSignature::new(decl.name, ret, params));
        }

        Ok(())
    }

    /// Returns everything parsed so far.
    #[must_use]
    pub fn finish(self) -> ParsedHeader {
        ParsedHeader {
            signatures: self.signatures.into_values().collect(),
            aliases: self.aliases,
        }
    }
}

#[derive(Debug)]
struct Declaration {
    name: String,
    return_type: String,
    parameters: Vec<String>,
}

/// Replaces comments with a single space and returns them with their offset in
/// the sanitized text.
fn strip_comments(source: &str) -> Result<(String, Vec<(usize, String)>)> {
    let mut sanitized = String::with_capacity(source.len());
    let mut comments = Vec::new();
    let mut rest = source;

    loop {
        let block = rest.find("/*");
        let line = find_line_comment(rest);

        let (start, is_block) = match (block, line) {
            (Some(b), Some(l)) if l < b => (l, false),
            (Some(b), _) => (b, true),
            (None, Some(l)) => (l, false),
            (None, None) => {
                sanitized.push_str(rest);
                break;
            }
        };

        sanitized.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let (text, consumed) = if is_block {
            let Some(end) = body.find("*/") else {
                return Err(malformed_error!(
                    "Unterminated block comment at byte {}",
                    source.len() - rest.len() + start
                ));
            };
            (&body[..end], end + 2)
        } else {
            let end = body.find('\n').unwrap_or(body.len());
            (&body[..end], end)
        };

        comments.push((sanitized.len(), text.to_string()));
        sanitized.push(' ');
        rest = &body[consumed..];
    }

    Ok((sanitized, comments))
}

/// Finds `//` that does not follow a `:` (keeps `http://` in string literals intact).
fn find_line_comment(text: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(found) = text[offset..].find("//") {
        let index = offset + found;
        if index == 0 || text.as_bytes()[index - 1] != b':' {
            return Some(index);
        }
        offset = index + 2;
    }
    None
}

fn alias_annotations(comment: &str) -> Vec<&str> {
    let mut aliases = Vec::new();
    let mut rest = comment;
    while let Some(index) = rest.find(ALIAS_MARKER) {
        rest = rest[index + ALIAS_MARKER.len()..].trim_start();
        let end = rest
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(rest.len());
        if end > 0 {
            aliases.push(&rest[..end]);
        }
        rest = &rest[end..];
    }
    aliases
}

/// Collects the names of `typedef enum { ... } Name;` declarations.
fn collect_enum_types(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = source;

    while let Some(index) = rest.find("typedef") {
        rest = &rest[index + "typedef".len()..];
        let Some(after_enum) = rest.trim_start().strip_prefix("enum") else {
            continue;
        };
        if after_enum.starts_with(is_ident_char) {
            continue;
        }

        // Optional tag name, then the body
        let Some(open) = after_enum.find(['{', '}', ';']) else {
            break;
        };
        if after_enum.as_bytes()[open] != b'{' {
            continue;
        }
        let body = &after_enum[open + 1..];
        let Some(close) = body.find('}') else {
            break;
        };
        let tail = body[close + 1..].trim_start();
        let end = tail.find(|c: char| !is_ident_char(c)).unwrap_or(tail.len());
        if end > 0 && tail[end..].trim_start().starts_with(';') {
            names.push(tail[..end].to_string());
        }
    }

    names
}

fn find_declarations(source: &str) -> Vec<(usize, Declaration)> {
    let mut declarations = Vec::new();
    let mut offset = 0;

    while let Some(found) = source[offset..].find(DECLARATION_MARKER) {
        let start = offset + found;
        let body_start = start + DECLARATION_MARKER.len();
        offset = body_start;

        // `MONO_API_DATA` and friends are not declarations
        if !source[body_start..].starts_with(char::is_whitespace) {
            continue;
        }
        let Some(end) = source[body_start..].find(';') else {
            break;
        };

        if let Some(decl) = parse_declaration(&source[body_start..body_start + end]) {
            declarations.push((start, decl));
        }
        offset = body_start + end + 1;
    }

    declarations
}

fn parse_declaration(declaration: &str) -> Option<Declaration> {
    let text = collapse_whitespace(declaration);
    let text = replace_words(&text, is_mono_macro);
    let text = replace_words(&text, |word| word == "struct" || word == "enum");
    let text = collapse_whitespace(&normalize_pointers(&text));

    let (before_params, params_tail) = text.split_once('(')?;
    let params_raw = params_tail.rsplit_once(')')?.0.trim();
    let before_params = before_params.trim();

    let name_start = before_params
        .rfind(|c: char| !is_ident_char(c))
        .map_or(0, |index| index + 1);
    let name = &before_params[name_start..];
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let return_type = before_params[..name_start].trim();
    if return_type.is_empty() {
        return None;
    }

    Some(Declaration {
        name: name.to_string(),
        return_type: return_type.to_string(),
        parameters: parse_parameters(params_raw),
    })
}

fn parse_parameters(text: &str) -> Vec<String> {
    if text.is_empty() || text == "void" {
        return Vec::new();
    }

    let mut raw = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                raw.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.is_empty() {
        raw.push(current);
    }

    let mut params = Vec::new();
    for param in raw {
        let param = param.trim();
        if param.is_empty() || param == "void" {
            continue;
        }

        // Function pointers and arrays decay to pointers
        if param.contains('(') || param.contains('[') {
            params.push("void*".to_string());
            continue;
        }

        let param = replace_words(param, is_mono_macro);
        let param = match param.split_once('=') {
            Some((before, _)) => before.to_string(),
            None => param,
        };
        let param = replace_words(&param, is_qualifier);
        let param = collapse_whitespace(&normalize_pointers(&param));
        if param == "..." {
            continue;
        }

        let mut tokens: Vec<&str> = param.split(' ').collect();
        if tokens.len() > 1 {
            tokens.pop();
        }
        let type_part = normalize_pointers(tokens.join(" ").trim());
        if !type_part.is_empty() {
            params.push(type_part);
        }
    }

    params
}

fn normalize_type(type_name: &str) -> String {
    let value = replace_words(type_name.trim(), is_qualifier);
    let value = replace_words(&value, |word| word == "struct" || word == "enum");
    collapse_whitespace(&normalize_pointers(&value))
}

/// Maps a normalized C type onto its ABI tag.
///
/// # Arguments
///
/// * `type_name` - Normalized C type (qualifiers removed, pointers compacted)
/// * `enum_types` - Names declared through `typedef enum`
#[must_use]
pub fn map_native_type(type_name: &str, enum_types: &HashSet<String>) -> NativeType {
    if type_name.is_empty() {
        return NativeType::Void;
    }
    if type_name.contains('*') || type_name.ends_with(']') {
        return NativeType::Pointer;
    }
    if enum_types.contains(type_name) {
        return NativeType::I32;
    }

    let canonical = type_name.replace(' ', "").to_ascii_lowercase();
    match canonical.as_str() {
        "void" => NativeType::Void,
        "bool" | "_bool" | "boolean" => NativeType::Bool,
        "char" => NativeType::I8,
        "unsignedchar" => NativeType::U8,
        "signedchar" | "short" | "shortint" | "int" | "int32" => NativeType::I32,
        "unsignedshort" | "unsignedshortint" | "unsignedint" | "uint" | "uint32" => NativeType::U32,
        "long" | "longint" | "time_t" => NativeType::ISize,
        "unsignedlong" | "unsignedlongint" | "size_t" => NativeType::USize,
        "int64" => NativeType::I64,
        "unsignedint64" => NativeType::U64,
        "double" => NativeType::F64,
        "float" => NativeType::F32,
        // Runtime and glib integer typedefs
        "mono_bool" | "mono_boolean" | "gboolean" | "gint" | "gint32" | "gint16" | "gint8"
        | "mono_marshaltype" => NativeType::I32,
        "mono_unichar2" | "gunichar2" | "guint" | "guint32" | "guint16" | "guint8"
        | "mono_string_hash" => NativeType::U32,
        "uintptr_t" | "gsize" => NativeType::USize,
        "intptr_t" | "ssize_t" | "gssize" | "ptrdiff_t" => NativeType::ISize,
        other => match other.strip_suffix("_t") {
            Some(stem) => {
                let digits: String = stem.chars().filter(char::is_ascii_digit).collect();
                let wide = digits.parse::<u32>().is_ok_and(|bits| bits > 32);
                match (stem.starts_with('u'), wide) {
                    (true, true) => NativeType::U64,
                    (true, false) => NativeType::U32,
                    (false, true) => NativeType::I64,
                    (false, false) => NativeType::I32,
                }
            }
            None => NativeType::Pointer,
        },
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_mono_macro(word: &str) -> bool {
    word.strip_prefix("MONO_").is_some_and(|rest| {
        !rest.is_empty()
            && rest
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    })
}

fn is_qualifier(word: &str) -> bool {
    matches!(word, "const" | "volatile" | "restrict")
}

/// Replaces every whole identifier matching `predicate` with a space.
fn replace_words(text: &str, predicate: impl Fn(&str) -> bool) -> String {
    let mut result = String::with_capacity(text.len());
    let mut word_start = None;

    for (index, c) in text.char_indices() {
        if is_ident_char(c) {
            word_start.get_or_insert(index);
            continue;
        }
        if let Some(start) = word_start.take() {
            push_word(&mut result, &text[start..index], &predicate);
        }
        result.push(c);
    }
    if let Some(start) = word_start {
        push_word(&mut result, &text[start..], &predicate);
    }

    result
}

fn push_word(result: &mut String, word: &str, predicate: &impl Fn(&str) -> bool) {
    if predicate(word) {
        result.push(' ');
    } else {
        result.push_str(word);
    }
}

/// Removes whitespace around every `*`.
fn normalize_pointers(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut skip_whitespace = false;
    for c in text.chars() {
        if c == '*' {
            let trimmed = result.trim_end().len();
            result.truncate(trimmed);
            result.push('*');
            skip_whitespace = true;
        } else if skip_whitespace && c.is_whitespace() {
            continue;
        } else {
            skip_whitespace = false;
            result.push(c);
        }
    }
    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NativeType::{Pointer, Void, F64, I32, I64, I8, ISize, U32, U64, U8, USize};

    const HEADER: &str = r"
#ifndef __TEST_H__
#define __TEST_H__

typedef enum {
    MONO_TYPE_END = 0,
    MONO_TYPE_VOID = 1
} MonoTypeEnum;

typedef enum _MonoImageOpenStatus {
    MONO_IMAGE_OK
} MonoImageOpenStatus;

// Line comment: MONO_API void commented_out(void);
MONO_API MONO_RT_EXTERNAL_ONLY MonoDomain *
mono_get_root_domain (void);

MONO_API int mono_type_get_type (MonoType *type);
MONO_API MonoTypeEnum mono_type_kind (MonoType* type);
MONO_API mono_bool mono_class_is_enum (MonoClass *klass);
MONO_API uint32_t mono_gchandle_new (MonoObject *obj, mono_bool pinned);
MONO_API int64_t mono_gc_get_heap_size (void);
MONO_API uint64_t mono_u64 (void);
MONO_API uintptr_t mono_thread_id (void);
MONO_API void mono_trace (const char *format, ...);
MONO_API void mono_set_dirs (const char *assembly_dir, const char *config_dir);
MONO_API void mono_callback (void (*func)(void *data), void *user_data);
MONO_API void mono_array (int values[4], unsigned char flag);
MONO_API double mono_double (struct _MonoObject * obj, char c);
MONO_API intptr_t mono_signed_ptr (long count, unsigned long size);
MONO_API MonoImageOpenStatus mono_image_status (int);
MONO_API void other_function (void);
MONO_API int mono_type_get_type (MonoType *type, int duplicate);

#endif
";

    fn find<'a>(parsed: &'a ParsedHeader, name: &str) -> &'a ExportSignature {
        parsed
            .signatures
            .iter()
            .find(|sig| sig.name == name)
            .unwrap_or_else(|| panic!("{name} not parsed"))
    }

    #[test]
    fn test_parse_declarations() {
        let parsed = parse_header(HEADER).unwrap();

        let root = find(&parsed, "mono_get_root_domain");
        assert_eq!(root.ret, Pointer);
        assert!(root.params.is_empty());

        assert_eq!(find(&parsed, "mono_type_kind").ret, I32);
        assert_eq!(find(&parsed, "mono_class_is_enum").ret, I32);
        assert_eq!(find(&parsed, "mono_gchandle_new").ret, U32);
        assert_eq!(find(&parsed, "mono_gchandle_new").params, vec![Pointer, I32]);
        assert_eq!(find(&parsed, "mono_gc_get_heap_size").ret, I64);
        assert_eq!(find(&parsed, "mono_u64").ret, U64);
        assert_eq!(find(&parsed, "mono_thread_id").ret, USize);
        assert_eq!(find(&parsed, "mono_trace").params, vec![Pointer]);
        assert_eq!(find(&parsed, "mono_set_dirs").params, vec![Pointer, Pointer]);
        assert_eq!(find(&parsed, "mono_callback").params, vec![Pointer, Pointer]);
        assert_eq!(find(&parsed, "mono_array").params, vec![Pointer, U8]);
        assert_eq!(find(&parsed, "mono_double").ret, F64);
        assert_eq!(find(&parsed, "mono_double").params, vec![Pointer, I8]);
        assert_eq!(find(&parsed, "mono_signed_ptr").ret, ISize);
        assert_eq!(find(&parsed, "mono_signed_ptr").params, vec![ISize, USize]);
        assert_eq!(find(&parsed, "mono_image_status").ret, I32);
        assert_eq!(find(&parsed, "mono_image_status").params, vec![I32]);
    }

    #[test]
    fn test_first_declaration_wins_and_filter() {
        let parsed = parse_header(HEADER).unwrap();

        assert_eq!(find(&parsed, "mono_type_get_type").params, vec![Pointer]);
        assert!(parsed.signatures.iter().all(|sig| sig.name.starts_with("mono")));
        assert!(!parsed.signatures.iter().any(|sig| sig.name == "commented_out"));

        let names: Vec<&str> = parsed.signatures.iter().map(|sig| sig.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_alias_rules() {
        let source = r"
/**
 * Get MonoType* from a System.Type reflection object
 * @alias mono_reflection_type_get_handle
 */
MONO_API MonoType *mono_reflection_type_get_type(MonoReflectionType *reftype);

/* @alias mono_get_root_domain_internal */
/* @alias mono_lookup_internal */
MONO_API void mono_profiler_install(void *prof, void *callback);
";
        let parsed = parse_header(source).unwrap();
        assert_eq!(
            parsed.aliases,
            vec![
                (
                    "mono_reflection_type_get_type".to_string(),
                    "mono_reflection_type_get_handle".to_string()
                ),
                ("mono_get_root_domain".to_string(), "mono_get_root_domain_internal".to_string()),
                ("mono_lookup".to_string(), "mono_lookup_internal".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_comment() {
        let result = parse_header("MONO_API void mono_a(void); /* never closed");
        assert!(matches!(result, Err(crate::Error::Malformed { .. })));
    }

    #[test]
    fn test_enum_types_carry_across_headers() {
        let mut parser = HeaderParser::new();
        parser
            .feed("typedef enum { A, B } MonoMarshalKind;")
            .unwrap();
        parser
            .feed("MONO_API MonoMarshalKind mono_marshal_kind (void);")
            .unwrap();
        let parsed = parser.finish();
        assert_eq!(parsed.signatures[0].ret, I32);
    }

    #[test]
    fn test_map_native_type() {
        let enums = HashSet::new();
        assert_eq!(map_native_type("", &enums), Void);
        assert_eq!(map_native_type("MonoObject*", &enums), Pointer);
        assert_eq!(map_native_type("gboolean", &enums), I32);
        assert_eq!(map_native_type("guint16", &enums), U32);
        assert_eq!(map_native_type("gsize", &enums), USize);
        assert_eq!(map_native_type("int16_t", &enums), I32);
        assert_eq!(map_native_type("MonoOpaqueThing", &enums), Pointer);
    }

    #[test]
    fn test_header_table_merges_aliases() {
        let table = crate::signatures::SignatureTable::from_headers([
            "MONO_API MonoDomain *mono_get_root_domain (void);",
            "/* @alias mono_get_root_domain_internal */",
        ])
        .unwrap();

        let root = table.get("mono_get_root_domain").unwrap();
        assert_eq!(root.aliases, vec!["mono_get_root_domain_internal".to_string()]);
    }
}
