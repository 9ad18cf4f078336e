//! Extraction: Doxygen compounds → registry records.

use std::path::Path;

use roxmltree::Node;
use tracing::{debug, info, trace};

use crate::config::ApiConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::doxygen;
use crate::handles;
use crate::model::*;

/// Enum values whose name ends with this are range sentinels and dropped.
pub const MAX_ENUM_SUFFIX: &str = "_MAX_ENUM";
/// Typedefs named like this are parsed as function pointers.
pub const FUNCTION_POINTER_PREFIX: &str = "PFN_";
/// Recognized `(callconv *)(` spellings between return type and parameters.
pub const CALLING_CONVENTIONS: &[&str] = &["(*)(", "(VKAPI_PTR *)("];

/// Intrinsic scalar types registered as `base` records.
pub const BASE_TYPES: &[&str] = &[
    "void",
    "char",
    "float",
    "double",
    "bool",
    "int",
    "unsigned int",
    "short",
    "long",
    "size_t",
    "int8_t",
    "uint8_t",
    "int16_t",
    "uint16_t",
    "int32_t",
    "uint32_t",
    "int64_t",
    "uint64_t",
    "intptr_t",
    "uintptr_t",
];

// ---------------------------------------------------------------------------
// Member loaders, one per Doxygen member kind
// ---------------------------------------------------------------------------

/// `<memberdef kind="variable">` → struct member.
pub fn load_variable(node: Node<'_, '_>) -> Option<Member> {
    let name = doxygen::non_empty_child_text(node, "name")?;
    let ty = doxygen::child_text(node, "type")?;
    let array_len = doxygen::child_text(node, "argsstring").and_then(|args| {
        args.strip_prefix('[')
            .and_then(|a| a.strip_suffix(']'))
            .map(|len| len.trim().to_string())
    });
    Some(Member {
        name,
        ty: DecoratedName::parse(&ty),
        array_len,
    })
}

/// `<memberdef kind="define">` → macro.
pub fn load_define(node: Node<'_, '_>) -> Option<(String, Macro)> {
    let name = doxygen::non_empty_child_text(node, "name")?;
    let value = doxygen::child_text(node, "initializer")?;
    Some((name, Macro { value }))
}

/// `<enumvalue>` → constant. Range sentinels (`*_MAX_ENUM`) yield `None`.
pub fn load_enum_value(node: Node<'_, '_>) -> Option<EnumConstant> {
    let name = doxygen::non_empty_child_text(node, "name")?;
    let initializer = doxygen::child_text(node, "initializer")?;
    if name.ends_with(MAX_ENUM_SUFFIX) {
        trace!(name = %name, "dropping enum range sentinel");
        return None;
    }
    let value = initializer
        .strip_prefix("= ")
        .map(str::to_string)
        .unwrap_or(initializer);
    Some(EnumConstant { name, value })
}

/// `<memberdef kind="enum">` → enumeration, values in encounter order.
pub fn load_enum(node: Node<'_, '_>) -> Option<(String, Enumeration)> {
    let name = doxygen::non_empty_child_text(node, "name")?;
    let underlying = doxygen::non_empty_child_text(node, "type").map(|t| DecoratedName::parse(&t));
    let mut enumeration = Enumeration::new(underlying);
    for value in node
        .children()
        .filter(|c| c.is_element() && c.has_tag_name("enumvalue"))
    {
        if let Some(constant) = load_enum_value(value) {
            enumeration.push(constant);
        }
    }
    Some((name, enumeration))
}

/// `<memberdef kind="typedef">` → alias, or function pointer for `PFN_*`
/// names whose declaration fits the expected shape.
pub fn load_typedef(node: Node<'_, '_>) -> Option<(String, TypeKind)> {
    let name = doxygen::non_empty_child_text(node, "name")?;
    let declared = typedef_declaration(node)?;

    let target = DecoratedName::parse(&declared);
    if is_self_alias(&name, &target) {
        trace!(name = %name, "dropping self-referential typedef");
        return None;
    }

    if name.starts_with(FUNCTION_POINTER_PREFIX) {
        match parse_function_pointer(&declared) {
            Some(f) => return Some((name, TypeKind::FunctionPointer(f))),
            None => {
                debug!(name = %name, declared = %declared, "not a function pointer shape, keeping as alias")
            }
        }
    }
    Some((name, TypeKind::Alias(Alias { target })))
}

/// True for `typedef struct X X;`, which [`load_typedef`] drops on purpose.
pub fn is_self_referential_typedef(node: Node<'_, '_>) -> bool {
    match (
        doxygen::non_empty_child_text(node, "name"),
        typedef_declaration(node),
    ) {
        (Some(name), Some(declared)) => is_self_alias(&name, &DecoratedName::parse(&declared)),
        _ => false,
    }
}

fn typedef_declaration(node: Node<'_, '_>) -> Option<String> {
    let ty = doxygen::child_text(node, "type")?;
    let args = doxygen::child_text(node, "argsstring")?;
    Some(format!("{ty}{args}"))
}

fn is_self_alias(name: &str, target: &DecoratedName) -> bool {
    target.name == name && target.postfix.is_empty()
}

/// `<memberdef kind="function">` → function.
pub fn load_function(node: Node<'_, '_>) -> Option<(String, Function)> {
    let name = doxygen::non_empty_child_text(node, "name")?;
    let return_type = doxygen::non_empty_child_text(node, "type")?;
    let mut params = Vec::new();
    for param in node
        .children()
        .filter(|c| c.is_element() && c.has_tag_name("param"))
    {
        let param_type = doxygen::non_empty_child_text(param, "type")?;
        let Some(param_name) = doxygen::non_empty_child_text(param, "declname") else {
            // `f(void)`
            if param_type == "void" {
                continue;
            }
            return None;
        };
        params.push(Param {
            name: param_name,
            ty: DecoratedName::parse(&param_type),
        });
    }
    Some((
        name,
        Function {
            return_type: DecoratedName::parse(&return_type),
            params,
        },
    ))
}

/// Parse `ReturnType (VKAPI_PTR *)(T1 a, T2 b)` (or the plain `(*)(` form).
///
/// Returns `None` when the calling convention or the closing parenthesis
/// doesn't match, or a parameter has no space separating type and name.
pub fn parse_function_pointer(declared: &str) -> Option<Function> {
    let declared = normalize_whitespace(declared);
    let open = declared.find('(')?;
    let return_type = declared[..open].trim();
    let rest = &declared[open..];

    let convention = CALLING_CONVENTIONS.iter().find(|c| rest.starts_with(**c))?;
    let inner = rest[convention.len()..].strip_suffix(')')?.trim();

    let mut params = Vec::new();
    if inner != "void" {
        for segment in inner.split(", ") {
            params.push(split_param(segment)?);
        }
    }
    Some(Function {
        return_type: DecoratedName::parse(return_type),
        params,
    })
}

/// Split `const T *name` into type `const T*` and name `name`.
fn split_param(segment: &str) -> Option<Param> {
    let segment = segment.trim();
    // Last space rather than first, so `unsigned int count` keeps its type.
    let space = segment.rfind(' ')?;
    let (ty, name) = (&segment[..space], &segment[space + 1..]);
    let declarators = name.len() - name.trim_start_matches(['*', '&']).len();
    let (stars, name) = name.split_at(declarators);
    if name.is_empty() {
        return None;
    }
    Some(Param {
        name: name.to_string(),
        ty: DecoratedName::parse(&format!("{ty}{stars}")),
    })
}

// ---------------------------------------------------------------------------
// Compound loaders
// ---------------------------------------------------------------------------

/// `<compounddef kind="struct">` → structure record.
pub fn load_struct(
    compound: Node<'_, '_>,
    tag: Tag,
    registry: &mut TypeRegistry,
    diagnostics: &mut Diagnostics,
) {
    let Some(name) = doxygen::non_empty_child_text(compound, "compoundname") else {
        diagnostics.warn(Stage::Load, None, "struct compound without a name, skipping");
        return;
    };
    let mut structure = Structure::default();
    for member in doxygen::members(compound) {
        let kind = member.attribute("kind").unwrap_or_default();
        if kind != "variable" {
            diagnostics.warn(
                Stage::Load,
                Some(&name),
                format!("ignoring struct member of kind `{kind}`"),
            );
            continue;
        }
        match load_variable(member) {
            Some(m) => structure.members.push(m),
            None => diagnostics.warn(
                Stage::Load,
                Some(&name),
                "skipping struct member without a name or type",
            ),
        }
    }
    debug!(name = %name, members = structure.members.len(), "extracted struct");
    registry.add(
        &name,
        TypeRecord::new(TypeKind::Structure(structure), tag),
        diagnostics,
    );
}

/// `<compounddef kind="file">` → macros, enumerations, typedefs, functions.
pub fn load_file(
    compound: Node<'_, '_>,
    tag: Tag,
    registry: &mut TypeRegistry,
    diagnostics: &mut Diagnostics,
) {
    let file_name = doxygen::child_text(compound, "compoundname").unwrap_or_default();
    for member in doxygen::members(compound) {
        let kind = member.attribute("kind").unwrap_or_default();
        let loaded = match kind {
            "define" => load_define(member).map(|(n, m)| (n, TypeKind::Macro(m))),
            "enum" => load_enum(member).map(|(n, e)| (n, TypeKind::Enumeration(e))),
            "typedef" => load_typedef(member),
            "function" => load_function(member).map(|(n, f)| (n, TypeKind::Function(f))),
            other => {
                let member_name = doxygen::child_text(member, "name");
                diagnostics.warn(
                    Stage::Load,
                    member_name.as_deref(),
                    format!("ignoring member of unknown kind `{other}` in `{file_name}`"),
                );
                continue;
            }
        };
        match loaded {
            Some((name, kind)) => {
                trace!(name = %name, kind = kind.kind_name(), "extracted file member");
                registry.add(&name, TypeRecord::new(kind, tag), diagnostics);
            }
            None if kind == "typedef" && is_self_referential_typedef(member) => {}
            None => {
                let member_name = doxygen::child_text(member, "name");
                diagnostics.warn(
                    Stage::Load,
                    member_name.as_deref(),
                    format!("skipping incomplete `{kind}` member in `{file_name}`"),
                );
            }
        }
    }
}

/// Load `{directory}/{refid}.xml` and dispatch on its compound kind.
pub fn load_compound(
    directory: &Path,
    refid: &str,
    tag: Tag,
    registry: &mut TypeRegistry,
    diagnostics: &mut Diagnostics,
) {
    let path = directory.join(format!("{refid}.xml"));
    doxygen::with_document(&path, diagnostics, |root, diagnostics| {
        let compounds = root
            .children()
            .filter(|c| c.is_element() && c.has_tag_name("compounddef"));
        for compound in compounds {
            match compound.attribute("kind").unwrap_or_default() {
                "struct" => load_struct(compound, tag, registry, diagnostics),
                "file" => load_file(compound, tag, registry, diagnostics),
                other => diagnostics.warn(
                    Stage::Load,
                    Some(refid),
                    format!("ignoring compound of unknown kind `{other}`"),
                ),
            }
        }
    });
}

/// Walk `{directory}/index.xml`, loading every struct and file compound.
///
/// Returns the number of compounds dispatched, or `None` when the index
/// itself could not be loaded.
pub fn load_index(
    directory: &Path,
    tag: Tag,
    registry: &mut TypeRegistry,
    diagnostics: &mut Diagnostics,
) -> Option<usize> {
    let index_path = directory.join("index.xml");
    doxygen::with_document(&index_path, diagnostics, |root, diagnostics| {
        let mut loaded = 0usize;
        let compounds = root
            .children()
            .filter(|c| c.is_element() && c.has_tag_name("compound"));
        for compound in compounds {
            let kind = compound.attribute("kind").unwrap_or_default();
            let Some(refid) = compound.attribute("refid") else {
                diagnostics.warn(Stage::Load, None, "index compound without a refid");
                continue;
            };
            match kind {
                "struct" | "file" => {
                    load_compound(directory, refid, tag, registry, diagnostics);
                    loaded += 1;
                }
                "page" | "dir" => {}
                other => diagnostics.warn(
                    Stage::Load,
                    Some(refid),
                    format!("ignoring index entry of unknown kind `{other}`"),
                ),
            }
        }
        loaded
    })
}

/// Load one api (Doxygen xml plus handle headers), tagging every record it
/// defines with `tag`. When the api names an xml directory whose index can't
/// be loaded, nothing of the api is registered, its headers included.
pub fn load_api(
    api: &ApiConfig,
    tag: Tag,
    registry: &mut TypeRegistry,
    diagnostics: &mut Diagnostics,
) {
    let compounds = match &api.xml {
        Some(dir) => match load_index(dir, tag, registry, diagnostics) {
            Some(count) => count,
            None => {
                info!(xml = %dir.display(), tag = ?tag, "index not loaded, api left out");
                return;
            }
        },
        None => 0,
    };

    let handles = handles::load_handle_list(&api.headers, diagnostics);
    for (name, handle) in &handles {
        registry.add(
            name,
            TypeRecord::new(TypeKind::Handle(handle.clone()), tag),
            diagnostics,
        );
    }

    info!(
        xml = ?api.xml,
        tag = ?tag,
        compounds,
        handles = handles.len(),
        "api loaded"
    );
}

/// Build the full registry: the main api as core, each helper api as
/// helper, then the intrinsic base types. Names that stay undefined are
/// reported as one diagnostic batch.
pub fn build_registry(
    main: &ApiConfig,
    helpers: &[ApiConfig],
    diagnostics: &mut Diagnostics,
) -> TypeRegistry {
    let mut registry = TypeRegistry::new();

    load_api(main, Tag::Core, &mut registry, diagnostics);
    for helper in helpers {
        load_api(helper, Tag::Helper, &mut registry, diagnostics);
    }
    register_base_types(&mut registry, diagnostics);

    let undefined = registry.undefined_names();
    info!(
        records = registry.len(),
        undefined = undefined.len(),
        "registry complete"
    );
    if !undefined.is_empty() {
        diagnostics.report_unresolved(undefined);
    }
    registry
}

/// Register every [`BASE_TYPES`] entry as a helper `base` record.
pub fn register_base_types(registry: &mut TypeRegistry, diagnostics: &mut Diagnostics) {
    for name in BASE_TYPES {
        registry.add(name, TypeRecord::new(TypeKind::Base, Tag::Helper), diagnostics);
    }
}
