//! Emitter: registry → registry-dialect xml tree.
//!
//! Four passes, each with its own "already emitted" set:
//!
//! 1. types: every core record, dependencies first;
//! 2. enumeration values for every enumeration reached in pass 1, plus the
//!    `API Constants` group;
//! 3. commands for every core function;
//! 4. the `<feature>` require list of everything emitted above.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, trace};

use crate::config::OutputConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::model::*;
use crate::xml::Element;

/// The primitive every `*Flags` bitmask is a typedef of.
pub const FLAGS_TYPE: &str = "VkFlags";
const FLAGS_SUFFIX: &str = "Flags";
const FLAG_BITS_SUFFIX: &str = "FlagBits";

/// Commands returning this get success/error code lists.
pub const RESULT_TYPE: &str = "VkResult";
pub const SUCCESS_CODES: &str = "VK_SUCCESS";
pub const ERROR_CODES: &str = "VK_ERROR_OUT_OF_HOST_MEMORY,VK_ERROR_OUT_OF_DEVICE_MEMORY,\
VK_ERROR_INITIALIZATION_FAILED,VK_ERROR_MEMORY_MAP_FAILED,VK_ERROR_FEATURE_NOT_PRESENT,\
VK_ERROR_UNKNOWN";

const PLATFORM_INCLUDE: &str = "vk_platform";
const PLATFORM_HEADER: &str = "vk_platform.h";
const CALLING_CONVENTION: &str = "VKAPI_PTR";
const CONSTANTS_GROUP: &str = "API Constants";

static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?\s*[-~]?\s*(0[xX][0-9A-Fa-f]+|[0-9]+(\.[0-9]*)?([eE][-+]?[0-9]+)?)[uUlLfF]*\s*\)?$")
        .expect("numeric literal pattern")
});

/// True when a macro value is a plain numeric literal (`256`, `(~0U)`,
/// `0x10ULL`, `1000.0f`), i.e. it belongs in `API Constants`.
pub fn is_api_constant(value: &str) -> bool {
    NUMERIC_LITERAL.is_match(value.trim())
}

/// Build the complete `<registry>` tree.
pub fn emit_registry(
    registry: &TypeRegistry,
    output: &OutputConfig,
    diagnostics: &mut Diagnostics,
) -> Element {
    let mut root = Element::new("registry");
    root.push_text_element(
        "comment",
        "This file is generated from the Doxygen xml of the memory allocator headers. \
         Do not edit it by hand.",
    );
    root.push(platforms());
    root.push(tags());

    let types = TypePass::run(registry, output, diagnostics);
    let enums = emit_enums(registry, &types.enums, &types.constants);
    let commands = CommandPass::run(registry);

    info!(
        types = types.names.len(),
        enums = enums.len(),
        constants = types.constants.len(),
        commands = commands.names.len(),
        "emitted registry"
    );

    let feature = emit_feature(output, &types, &commands.names);
    root.push(types.element);
    for e in enums {
        root.push(e);
    }
    root.push(commands.element);
    root.push(feature);
    root.push(Element::new("extensions").attr("comment", "none"));
    root
}

/// Serialize the registry as a complete xml document.
pub fn emit_registry_xml(
    registry: &TypeRegistry,
    output: &OutputConfig,
    diagnostics: &mut Diagnostics,
) -> String {
    emit_registry(registry, output, diagnostics).to_document()
}

// ---------------------------------------------------------------------------
// Fixed boilerplate
// ---------------------------------------------------------------------------

fn platforms() -> Element {
    let entries = [
        ("xlib", "VK_USE_PLATFORM_XLIB_KHR", "X Window System, Xlib client library"),
        ("xcb", "VK_USE_PLATFORM_XCB_KHR", "X Window System, Xcb client library"),
        ("wayland", "VK_USE_PLATFORM_WAYLAND_KHR", "Wayland display server protocol"),
        ("android", "VK_USE_PLATFORM_ANDROID_KHR", "Android OS"),
        ("win32", "VK_USE_PLATFORM_WIN32_KHR", "Microsoft Win32 API (also refers to Win64 apps)"),
        ("macos", "VK_USE_PLATFORM_MACOS_MVK", "Apple MacOS"),
        ("metal", "VK_USE_PLATFORM_METAL_EXT", "Metal on CoreAnimation on Apple platforms"),
    ];
    let mut el = Element::new("platforms").attr("comment", "platforms the allocator builds on");
    for (name, protect, comment) in entries {
        el.push(
            Element::new("platform")
                .attr("name", name)
                .attr("protect", protect)
                .attr("comment", comment),
        );
    }
    el
}

fn tags() -> Element {
    let entries = [
        ("AMD", "Advanced Micro Devices, Inc.", "gpuopen@amd.com"),
        ("KHR", "Khronos Group", "registry@khronos.org"),
        ("EXT", "Multivendor", "registry@khronos.org"),
    ];
    let mut el = Element::new("tags").attr("comment", "vendor/author tags for extension names");
    for (name, author, contact) in entries {
        el.push(
            Element::new("tag")
                .attr("name", name)
                .attr("author", author)
                .attr("contact", contact),
        );
    }
    el
}

// ---------------------------------------------------------------------------
// Pass 1: types
// ---------------------------------------------------------------------------

/// Result of the type pass: the `<types>` element plus what later passes
/// need to know about it.
struct TypePass<'a> {
    registry: &'a TypeRegistry,
    output: &'a OutputConfig,
    emitted: HashSet<String>,
    element: Element,
    /// Every type name written, in emission order.
    names: Vec<String>,
    /// Enumerations reached, in emission order.
    enums: Vec<String>,
    /// Core macros with plain numeric values.
    constants: Vec<(String, String)>,
}

impl<'a> TypePass<'a> {
    fn run(
        registry: &'a TypeRegistry,
        output: &'a OutputConfig,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut element = Element::new("types").attr("comment", "allocator type definitions");
        element.push(
            Element::new("type")
                .attr("category", "include")
                .attr("name", PLATFORM_INCLUDE)
                .text(format!("#include \"{PLATFORM_HEADER}\"")),
        );
        element.push(
            Element::new("type")
                .attr("category", "include")
                .attr("name", output.include.as_str())
                .text(format!("#include \"{}\"", output.include_header)),
        );

        let mut pass = Self {
            registry,
            output,
            emitted: HashSet::new(),
            element,
            names: Vec::new(),
            enums: Vec::new(),
            constants: Vec::new(),
        };
        for (name, record) in registry.iter() {
            if record.is_core() {
                pass.emit(name, diagnostics);
            }
        }
        pass
    }

    /// Emit `name` once, after everything it depends on.
    fn emit(&mut self, name: &str, diagnostics: &mut Diagnostics) {
        if name.is_empty() || !self.emitted.insert(name.to_string()) {
            return;
        }
        let registry = self.registry;
        let Some(record) = registry.lookup(name) else {
            diagnostics.warn(Stage::Emit, Some(name), "referenced type missing from the registry");
            return;
        };
        if !record.is_core() {
            self.emit_stub(name, record);
            return;
        }

        match &record.kind {
            TypeKind::Structure(s) => {
                for m in &s.members {
                    self.emit(&m.ty.name, diagnostics);
                }
                self.emit_struct(name, s);
            }
            TypeKind::Handle(h) => {
                if let Some(parent) = &h.parent {
                    self.emit(parent, diagnostics);
                }
                self.emit_handle(name, h);
            }
            TypeKind::Macro(m) => self.emit_macro(name, m),
            TypeKind::Enumeration(e) => {
                if let Some(underlying) = &e.underlying {
                    self.emit(&underlying.name, diagnostics);
                }
                self.push_type(
                    name,
                    Element::new("type").attr("name", name).attr("category", "enum"),
                );
                self.enums.push(name.to_string());
            }
            TypeKind::Function(f) => {
                // Written by the command pass; only its types belong here.
                self.emit_signature_types(f, diagnostics);
            }
            TypeKind::FunctionPointer(f) => {
                self.emit_signature_types(f, diagnostics);
                self.emit_function_pointer(name, f);
            }
            TypeKind::Alias(a) => self.emit_alias(name, a, diagnostics),
            TypeKind::Base | TypeKind::Undefined => self.emit_stub(name, record),
        }
    }

    fn emit_signature_types(&mut self, f: &Function, diagnostics: &mut Diagnostics) {
        self.emit(&f.return_type.name, diagnostics);
        for p in &f.params {
            self.emit(&p.ty.name, diagnostics);
        }
    }

    fn push_type(&mut self, name: &str, element: Element) {
        trace!(name, "emitted type");
        self.names.push(name.to_string());
        self.element.push(element);
    }

    /// Forward declaration for a record that isn't generated in full.
    fn emit_stub(&mut self, name: &str, record: &TypeRecord) {
        let mut el = Element::new("type");
        match &record.kind {
            TypeKind::Base => {
                el.set_attr("requires", PLATFORM_INCLUDE);
                el.set_attr("name", name);
            }
            TypeKind::Enumeration(_) => {
                el.set_attr("name", name);
                el.set_attr("category", "enum");
                self.enums.push(name.to_string());
            }
            other => {
                if let Some(category) = stub_category(other) {
                    el.set_attr("category", category);
                }
                el.set_attr("requires", self.output.include.as_str());
                el.set_attr("name", name);
            }
        }
        self.push_type(name, el);
    }

    fn emit_struct(&mut self, name: &str, s: &Structure) {
        let mut el = Element::new("type").attr("category", "struct").attr("name", name);
        for m in &s.members {
            let mut member = Element::new("member");
            push_decorated(&mut member, &m.ty);
            member.push_text(" ");
            member.push_text_element("name", &m.name);
            if let Some(len) = &m.array_len {
                if len.chars().all(|c| c.is_ascii_digit()) {
                    member.push_text(format!("[{len}]"));
                } else {
                    member.push_text("[");
                    member.push_text_element("enum", len);
                    member.push_text("]");
                }
            }
            el.push(member);
        }
        debug!(name, members = s.members.len(), "emitted struct");
        self.push_type(name, el);
    }

    fn emit_handle(&mut self, name: &str, h: &Handle) {
        let mut el = Element::new("type").attr("category", "handle");
        if let Some(parent) = &h.parent {
            el.set_attr("parent", parent.as_str());
        }
        el.set_attr("objtypeenum", "VK_OBJECT_TYPE_UNKNOWN");
        let macro_name = if h.dispatchable {
            "VK_DEFINE_HANDLE"
        } else {
            "VK_DEFINE_NON_DISPATCHABLE_HANDLE"
        };
        el.push_text_element("type", macro_name);
        el.push_text("(");
        el.push_text_element("name", name);
        el.push_text(")");
        self.push_type(name, el);
    }

    fn emit_macro(&mut self, name: &str, m: &Macro) {
        if is_api_constant(&m.value) {
            trace!(name, value = %m.value, "macro is an api constant");
            self.constants.push((name.to_string(), m.value.clone()));
            return;
        }
        let mut el = Element::new("type").attr("category", "define").text("#define ");
        el.push_text_element("name", name);
        if !m.value.is_empty() {
            el.push_text(format!(" {}", m.value));
        }
        self.push_type(name, el);
    }

    fn emit_function_pointer(&mut self, name: &str, f: &Function) {
        let mut el = Element::new("type").attr("category", "funcpointer");
        el.push_text(format!(
            "typedef {} ({CALLING_CONVENTION} *",
            tight(&f.return_type.full())
        ));
        el.push_text_element("name", name);
        el.push_text(")(");
        if f.params.is_empty() {
            el.push_text("void");
        }
        for (i, p) in f.params.iter().enumerate() {
            if i > 0 {
                el.push_text(", ");
            }
            push_decorated(&mut el, &p.ty);
            el.push_text(format!(" {}", p.name));
        }
        el.push_text(");");
        self.push_type(name, el);
    }

    fn emit_alias(&mut self, name: &str, a: &Alias, diagnostics: &mut Diagnostics) {
        if let Some(bits) = bitmask_bits(name, &a.target) {
            self.emit(FLAGS_TYPE, diagnostics);
            let mut el = Element::new("type");
            let has_bits = matches!(
                self.registry.lookup(&bits).map(|r| &r.kind),
                Some(TypeKind::Enumeration(_))
            );
            // Without a bits enumeration there is nothing to require; registry
            // consumers read a missing `requires` as none.
            if has_bits {
                self.emit(&bits, diagnostics);
                el.set_attr("requires", bits.as_str());
            }
            el.set_attr("category", "bitmask");
            el.push_text("typedef ");
            el.push_text_element("type", FLAGS_TYPE);
            el.push_text(" ");
            el.push_text_element("name", name);
            el.push_text(";");
            debug!(name, bits = has_bits, "promoted flags alias to bitmask");
            self.push_type(name, el);
            return;
        }

        self.emit(&a.target.name, diagnostics);
        let category = match a.target.is_plain() {
            true => category_of(self.registry, &a.target.name, 0),
            false => None,
        };
        let el = match category {
            Some(category) => Element::new("type")
                .attr("category", category)
                .attr("name", name)
                .attr("alias", a.target.name.as_str()),
            None => {
                let mut el = Element::new("type").attr("category", "basetype").text("typedef ");
                push_decorated(&mut el, &a.target);
                el.push_text(" ");
                el.push_text_element("name", name);
                el.push_text(";");
                el
            }
        };
        self.push_type(name, el);
    }
}

/// The `*FlagBits` enumeration name for a `*Flags` alias of [`FLAGS_TYPE`].
fn bitmask_bits(name: &str, target: &DecoratedName) -> Option<String> {
    if target.name != FLAGS_TYPE || !target.is_plain() {
        return None;
    }
    let stem = name.strip_suffix(FLAGS_SUFFIX)?;
    Some(format!("{stem}{FLAG_BITS_SUFFIX}"))
}

/// Output category a plain alias of `name` should carry.
fn category_of(registry: &TypeRegistry, name: &str, depth: usize) -> Option<&'static str> {
    // Guards alias cycles.
    if depth > 16 {
        return None;
    }
    match &registry.lookup(name)?.kind {
        TypeKind::Structure(_) => Some("struct"),
        TypeKind::Handle(_) => Some("handle"),
        TypeKind::Enumeration(_) => Some("enum"),
        TypeKind::FunctionPointer(_) => Some("funcpointer"),
        TypeKind::Alias(a) => match bitmask_bits(name, &a.target) {
            Some(_) => Some("bitmask"),
            None if a.target.is_plain() => category_of(registry, &a.target.name, depth + 1),
            None => None,
        },
        TypeKind::Undefined
        | TypeKind::Macro(_)
        | TypeKind::Function(_)
        | TypeKind::Base => None,
    }
}

fn stub_category(kind: &TypeKind) -> Option<&'static str> {
    match kind {
        TypeKind::Structure(_) => Some("struct"),
        TypeKind::Handle(_) => Some("handle"),
        TypeKind::Enumeration(_) => Some("enum"),
        TypeKind::FunctionPointer(_) => Some("funcpointer"),
        TypeKind::Undefined
        | TypeKind::Macro(_)
        | TypeKind::Function(_)
        | TypeKind::Alias(_)
        | TypeKind::Base => None,
    }
}

/// Append `prefix<type>name</type>postfix` to `el`.
fn push_decorated(el: &mut Element, ty: &DecoratedName) {
    el.push_text(ty.prefix.as_str());
    el.push_text_element("type", &ty.name);
    el.push_text(tight(&ty.postfix));
}

/// Attach pointer/reference declarators to the preceding token: `T *` → `T*`.
fn tight(text: &str) -> String {
    text.replace(" *", "*").replace(" &", "&")
}

// ---------------------------------------------------------------------------
// Pass 2: enumeration values
// ---------------------------------------------------------------------------

fn emit_enums(
    registry: &TypeRegistry,
    enums: &[String],
    constants: &[(String, String)],
) -> Vec<Element> {
    let mut out = Vec::new();

    let mut group = Element::new("enums")
        .attr("name", CONSTANTS_GROUP)
        .attr("comment", "plain numeric macros of the api");
    for (name, value) in constants {
        group.push(Element::new("enum").attr("name", name.as_str()).attr("value", value.as_str()));
    }
    out.push(group);

    let mut emitted = HashSet::new();
    for name in enums {
        if !emitted.insert(name.as_str()) {
            continue;
        }
        let Some(TypeKind::Enumeration(e)) = registry.lookup(name).map(|r| &r.kind) else {
            continue;
        };
        let kind = if name.ends_with(FLAG_BITS_SUFFIX) {
            "bitmask"
        } else {
            "enum"
        };
        let mut el = Element::new("enums").attr("name", name.as_str()).attr("type", kind);
        for v in &e.values {
            el.push(Element::new("enum").attr("value", v.value.as_str()).attr("name", v.name.as_str()));
        }
        for alias in &e.aliases {
            let entry = match e.alias_target(alias) {
                Some(target) => Element::new("enum")
                    .attr("name", alias.name.as_str())
                    .attr("alias", target.name.as_str()),
                None => Element::new("enum")
                    .attr("value", alias.value.as_str())
                    .attr("name", alias.name.as_str()),
            };
            el.push(entry);
        }
        trace!(name = %name, values = e.values.len(), aliases = e.aliases.len(), "emitted enum values");
        out.push(el);
    }
    out
}

// ---------------------------------------------------------------------------
// Pass 3: commands
// ---------------------------------------------------------------------------

struct CommandPass {
    element: Element,
    names: Vec<String>,
}

impl CommandPass {
    fn run(registry: &TypeRegistry) -> Self {
        let mut element = Element::new("commands").attr("comment", "allocator entry points");
        let mut names = Vec::new();
        let mut emitted = HashSet::new();
        for (name, record) in registry.iter() {
            let TypeKind::Function(f) = &record.kind else {
                continue;
            };
            if !record.is_core() || !emitted.insert(name) {
                continue;
            }
            element.push(command(name, f));
            names.push(name.to_string());
        }
        Self { element, names }
    }
}

fn command(name: &str, f: &Function) -> Element {
    let mut el = Element::new("command");
    if f.return_type.is_plain() && f.return_type.name == RESULT_TYPE {
        el.set_attr("successcodes", SUCCESS_CODES);
        el.set_attr("errorcodes", ERROR_CODES);
    }
    let mut proto = Element::new("proto");
    push_decorated(&mut proto, &f.return_type);
    proto.push_text(" ");
    proto.push_text_element("name", name);
    el.push(proto);
    for p in &f.params {
        let mut param = Element::new("param");
        push_decorated(&mut param, &p.ty);
        param.push_text(" ");
        param.push_text_element("name", &p.name);
        el.push(param);
    }
    trace!(name, params = f.params.len(), "emitted command");
    el
}

// ---------------------------------------------------------------------------
// Pass 4: feature
// ---------------------------------------------------------------------------

fn emit_feature(output: &OutputConfig, types: &TypePass<'_>, commands: &[String]) -> Element {
    let mut require = Element::new("require");
    for name in &types.names {
        require.push(Element::new("type").attr("name", name.as_str()));
    }
    for (name, _) in &types.constants {
        require.push(Element::new("enum").attr("name", name.as_str()));
    }
    for name in commands {
        require.push(Element::new("command").attr("name", name.as_str()));
    }
    Element::new("feature")
        .attr("api", output.api.as_str())
        .attr("name", output.feature.as_str())
        .attr("number", output.number.as_str())
        .attr("comment", "everything the allocator api defines")
        .child(require)
}
