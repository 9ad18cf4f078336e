//! End-to-end generation over the allocator fixture: a core api with a
//! vulkan helper api, read back and checked against the registry dialect.

use std::path::Path;
use std::sync::LazyLock;

use roxmltree::{Document, Node};
use vkma_xml::Generated;
use vkma_xml::diagnostics::{Severity, Stage};

static GENERATED: LazyLock<Generated> = LazyLock::new(|| {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../tests/fixtures/vma/vma.toml");
    vkma_xml::generate(&path).expect("generation from the vma fixture")
});

fn document() -> Document<'static> {
    Document::parse(&GENERATED.xml).expect("generated registry is well-formed xml")
}

fn element<'a, 'input>(parent: Node<'a, 'input>, tag: &str) -> Node<'a, 'input> {
    parent
        .children()
        .find(|c| c.has_tag_name(tag))
        .unwrap_or_else(|| panic!("<{tag}> missing under <{}>", parent.tag_name().name()))
}

fn elements<'a, 'input>(parent: Node<'a, 'input>, tag: &str) -> Vec<Node<'a, 'input>> {
    parent.children().filter(|c| c.has_tag_name(tag)).collect()
}

/// Concatenated text of every descendant, i.e. the C declaration a mixed
/// content element spells.
fn flat(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// `name` attribute, or the `<name>` child for handle/define/funcpointer
/// entries.
fn type_name(node: Node<'_, '_>) -> Option<String> {
    node.attribute("name").map(str::to_string).or_else(|| {
        node.children()
            .find(|c| c.has_tag_name("name"))
            .and_then(|n| n.text())
            .map(str::to_string)
    })
}

fn type_names(doc: &Document<'_>) -> Vec<String> {
    let types = element(doc.root_element(), "types");
    elements(types, "type").into_iter().filter_map(type_name).collect()
}

fn find_type<'a, 'input>(doc: &'a Document<'input>, name: &str) -> Node<'a, 'input> {
    let types = element(doc.root_element(), "types");
    elements(types, "type")
        .into_iter()
        .find(|t| type_name(*t).as_deref() == Some(name))
        .unwrap_or_else(|| panic!("type `{name}` not emitted"))
}

fn position(names: &[String], name: &str) -> usize {
    names
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("type `{name}` not emitted"))
}

#[test]
fn top_level_sections_in_order() {
    let doc = document();
    let root = doc.root_element();
    assert!(root.has_tag_name("registry"));
    let sections: Vec<&str> = root
        .children()
        .filter(|c| c.is_element())
        .map(|c| c.tag_name().name())
        .collect();
    assert_eq!(
        sections,
        [
            "comment",
            "platforms",
            "tags",
            "types",
            "enums",
            "enums",
            "enums",
            "enums",
            "enums",
            "commands",
            "feature",
            "extensions"
        ]
    );
    assert_eq!(element(root, "extensions").attribute("comment"), Some("none"));
}

#[test]
fn every_type_is_emitted_once() {
    let doc = document();
    let names = type_names(&doc);
    let mut seen = std::collections::HashSet::new();
    for name in &names {
        assert!(seen.insert(name), "`{name}` emitted twice");
    }
}

#[test]
fn includes_come_first() {
    let doc = document();
    let types = element(doc.root_element(), "types");
    let includes: Vec<(Option<&str>, Option<&str>, String)> = elements(types, "type")
        .into_iter()
        .take(2)
        .map(|t| (t.attribute("category"), t.attribute("name"), flat(t)))
        .collect();
    assert_eq!(
        includes,
        [
            (
                Some("include"),
                Some("vk_platform"),
                "#include \"vk_platform.h\"".to_string()
            ),
            (
                Some("include"),
                Some("vulkan"),
                "#include \"vulkan/vulkan.h\"".to_string()
            ),
        ]
    );
}

#[test]
fn struct_members_in_declaration_order() {
    let doc = document();
    let info = find_type(&doc, "VmaAllocatorCreateInfo");
    assert_eq!(info.attribute("category"), Some("struct"));

    let members: Vec<String> = elements(info, "member").into_iter().map(flat).collect();
    assert_eq!(
        members,
        [
            "VmaAllocatorCreateFlags flags",
            "VkPhysicalDevice physicalDevice",
            "VkDevice device",
            "VkDeviceSize preferredLargeHeapBlockSize",
            "const VkAllocationCallbacks* pAllocationCallbacks",
            "const VmaDeviceMemoryCallbacks* pDeviceMemoryCallbacks",
            "const VkDeviceSize* pHeapSizeLimit",
            "VkInstance instance",
            "uint32_t vulkanApiVersion",
        ]
    );
}

#[test]
fn array_members_keep_their_length() {
    let doc = document();
    let detailed = find_type(&doc, "VmaDetailedStatistics");
    let reserved = elements(detailed, "member")
        .into_iter()
        .find(|m| flat(*m).contains("reserved"))
        .expect("reserved member");
    assert_eq!(flat(reserved), "uint32_t reserved[4]");

    let total = find_type(&doc, "VmaTotalStatistics");
    let memory_type = elements(total, "member")[0];
    assert_eq!(flat(memory_type), "VmaDetailedStatistics memoryType[VK_MAX_MEMORY_TYPES]");
    assert_eq!(
        element(memory_type, "enum").text(),
        Some("VK_MAX_MEMORY_TYPES")
    );
}

#[test]
fn dependencies_precede_dependents() {
    let doc = document();
    let names = type_names(&doc);
    let before = |a: &str, b: &str| {
        assert!(
            position(&names, a) < position(&names, b),
            "`{a}` should be emitted before `{b}`"
        );
    };
    before("VmaAllocator", "VmaAllocation");
    before("VmaAllocator", "VmaPool");
    before("VmaAllocator", "PFN_vmaAllocateDeviceMemoryFunction");
    before("PFN_vmaAllocateDeviceMemoryFunction", "VmaDeviceMemoryCallbacks");
    before("VmaDeviceMemoryCallbacks", "VmaAllocatorCreateInfo");
    before("VmaAllocatorCreateFlags", "VmaAllocatorCreateInfo");
    before("VmaAllocatorCreateFlagBits", "VmaAllocatorCreateFlags");
    before("VmaDetailedStatistics", "VmaTotalStatistics");
    before("VkFlags", "VmaPoolCreateFlags");
}

#[test]
fn struct_declaration_merges_into_handle() {
    let doc = document();
    let allocator = find_type(&doc, "VmaAllocator");
    assert_eq!(allocator.attribute("category"), Some("handle"));
    assert_eq!(allocator.attribute("parent"), None);
    assert_eq!(allocator.attribute("objtypeenum"), Some("VK_OBJECT_TYPE_UNKNOWN"));
    assert_eq!(flat(allocator), "VK_DEFINE_HANDLE(VmaAllocator)");
}

#[test]
fn non_dispatchable_handles_carry_parent() {
    let doc = document();
    let allocation = find_type(&doc, "VmaAllocation");
    assert_eq!(allocation.attribute("parent"), Some("VmaAllocator"));
    assert_eq!(
        flat(allocation),
        "VK_DEFINE_NON_DISPATCHABLE_HANDLE(VmaAllocation)"
    );

    let context = find_type(&doc, "VmaDefragmentationContext");
    assert_eq!(context.attribute("parent"), None);
}

#[test]
fn flags_alias_becomes_bitmask() {
    let doc = document();
    let flags = find_type(&doc, "VmaAllocatorCreateFlags");
    assert_eq!(flags.attribute("category"), Some("bitmask"));
    assert_eq!(flags.attribute("requires"), Some("VmaAllocatorCreateFlagBits"));
    assert_eq!(flat(flags), "typedef VkFlags VmaAllocatorCreateFlags;");

    // No VmaPoolCreateFlagBits enumeration exists.
    let pool_flags = find_type(&doc, "VmaPoolCreateFlags");
    assert_eq!(pool_flags.attribute("category"), Some("bitmask"));
    assert_eq!(pool_flags.attribute("requires"), None);
}

#[test]
fn function_pointer_signature() {
    let doc = document();
    let allocate = find_type(&doc, "PFN_vmaAllocateDeviceMemoryFunction");
    assert_eq!(allocate.attribute("category"), Some("funcpointer"));
    assert_eq!(
        flat(allocate),
        "typedef void (VKAPI_PTR *PFN_vmaAllocateDeviceMemoryFunction)(VmaAllocator allocator, \
         uint32_t memoryType, VkDeviceMemory memory, VkDeviceSize size, void* pUserData);"
    );
    let referenced: Vec<&str> = elements(allocate, "type")
        .into_iter()
        .filter_map(|t| t.text())
        .collect();
    assert_eq!(
        referenced,
        ["VmaAllocator", "uint32_t", "VkDeviceMemory", "VkDeviceSize", "void"]
    );

    // A line break inside the Doxygen argsstring changes nothing.
    let free = find_type(&doc, "PFN_vmaFreeDeviceMemoryFunction");
    assert_eq!(
        flat(free).replace("vmaFree", "vmaAllocate"),
        flat(allocate)
    );
}

#[test]
fn non_numeric_macro_is_a_define() {
    let doc = document();
    let define = find_type(&doc, "VMA_ATTR_UNUSED");
    assert_eq!(define.attribute("category"), Some("define"));
    assert_eq!(flat(define), "#define VMA_ATTR_UNUSED __attribute__((unused))");

    let names = type_names(&doc);
    assert!(!names.contains(&"VMA_VULKAN_VERSION".to_string()));
    assert!(!names.contains(&"VMA_CALL_PRE".to_string()), "macro without a value");
}

#[test]
fn helper_records_are_forward_declared() {
    let doc = document();

    let device_memory = find_type(&doc, "VkDeviceMemory");
    assert_eq!(device_memory.attribute("category"), Some("handle"));
    assert_eq!(device_memory.attribute("requires"), Some("vulkan"));
    assert!(device_memory.children().next().is_none(), "stubs have no body");

    let size = find_type(&doc, "VkDeviceSize");
    assert_eq!(size.attribute("category"), None);
    assert_eq!(size.attribute("requires"), Some("vulkan"));

    let uint = find_type(&doc, "uint32_t");
    assert_eq!(uint.attribute("requires"), Some("vk_platform"));

    // Still undefined after every api was loaded.
    let callbacks = find_type(&doc, "VkAllocationCallbacks");
    assert_eq!(callbacks.attribute("requires"), Some("vulkan"));

    let result = find_type(&doc, "VkResult");
    assert_eq!(result.attribute("category"), Some("enum"));
    assert_eq!(result.attribute("requires"), None);
}

#[test]
fn unreferenced_helper_records_are_left_out() {
    let doc = document();
    let names = type_names(&doc);
    // Only reachable through VkDevice's parent chain, which stubs don't follow.
    assert!(!names.contains(&"uint64_t".to_string()));
    assert!(!names.contains(&"double".to_string()));
}

#[test]
fn api_constants_group() {
    let doc = document();
    let groups = elements(doc.root_element(), "enums");
    let constants = groups[0];
    assert_eq!(constants.attribute("name"), Some("API Constants"));
    let entries: Vec<(Option<&str>, Option<&str>)> = elements(constants, "enum")
        .into_iter()
        .map(|e| (e.attribute("name"), e.attribute("value")))
        .collect();
    assert_eq!(
        entries,
        [
            (Some("VMA_STATS_STRING_ENABLED"), Some("1")),
            (Some("VMA_VULKAN_VERSION"), Some("1002000")),
        ]
    );
}

#[test]
fn enumeration_values_and_aliases() {
    let doc = document();
    let groups = elements(doc.root_element(), "enums");
    let names: Vec<Option<&str>> = groups.iter().map(|g| g.attribute("name")).collect();
    assert_eq!(
        names,
        [
            Some("API Constants"),
            Some("VmaAllocationCreateFlagBits"),
            Some("VmaAllocatorCreateFlagBits"),
            Some("VmaMemoryUsage"),
            Some("VkResult"),
        ]
    );

    let allocation = groups[1];
    assert_eq!(allocation.attribute("type"), Some("bitmask"));
    let entries: Vec<(Option<&str>, Option<&str>, Option<&str>)> = elements(allocation, "enum")
        .into_iter()
        .map(|e| (e.attribute("name"), e.attribute("value"), e.attribute("alias")))
        .collect();
    assert_eq!(
        entries,
        [
            (
                Some("VMA_ALLOCATION_CREATE_DEDICATED_MEMORY_BIT"),
                Some("0x00000001"),
                None
            ),
            (
                Some("VMA_ALLOCATION_CREATE_STRATEGY_MIN_MEMORY_BIT"),
                Some("0x00010000"),
                None
            ),
            (
                Some("VMA_ALLOCATION_CREATE_STRATEGY_BEST_FIT_BIT"),
                None,
                Some("VMA_ALLOCATION_CREATE_STRATEGY_MIN_MEMORY_BIT")
            ),
        ]
    );

    let usage = groups[3];
    assert_eq!(usage.attribute("type"), Some("enum"));
    let values: Vec<Option<&str>> = elements(usage, "enum")
        .into_iter()
        .map(|e| e.attribute("value"))
        .collect();
    assert_eq!(values, [Some("0"), Some("1"), Some("2")]);

    let all_names: Vec<&str> = doc
        .descendants()
        .filter(|n| n.has_tag_name("enum"))
        .filter_map(|n| n.attribute("name"))
        .collect();
    assert!(
        all_names.iter().all(|n| !n.ends_with("_MAX_ENUM")),
        "range sentinels must be dropped: {all_names:?}"
    );

    let result = groups[4];
    let codes: Vec<Option<&str>> = elements(result, "enum")
        .into_iter()
        .map(|e| e.attribute("value"))
        .collect();
    assert_eq!(codes, [Some("0"), Some("1"), Some("-1")]);
}

#[test]
fn commands_in_name_order_with_result_codes() {
    let doc = document();
    let commands = element(doc.root_element(), "commands");
    let list = elements(commands, "command");
    let names: Vec<String> = list
        .iter()
        .map(|c| flat(element(*c, "proto")))
        .collect();
    assert_eq!(
        names,
        [
            "VkResult vmaCreateAllocator",
            "void vmaDestroyAllocator",
            "void vmaGetAllocationInfo",
            "uint32_t vmaGetVersion",
        ]
    );

    let create = list[0];
    assert_eq!(create.attribute("successcodes"), Some("VK_SUCCESS"));
    assert!(
        create
            .attribute("errorcodes")
            .is_some_and(|codes| codes.split(',').any(|c| c == "VK_ERROR_OUT_OF_HOST_MEMORY"))
    );
    let params: Vec<String> = elements(create, "param").into_iter().map(flat).collect();
    assert_eq!(
        params,
        [
            "const VmaAllocatorCreateInfo* pCreateInfo",
            "VmaAllocator* pAllocator"
        ]
    );

    let destroy = list[1];
    assert_eq!(destroy.attribute("successcodes"), None);
    assert_eq!(destroy.attribute("errorcodes"), None);

    // `(void)` has no parameters.
    assert!(elements(list[3], "param").is_empty());
}

#[test]
fn feature_requires_everything_emitted() {
    let doc = document();
    let feature = element(doc.root_element(), "feature");
    assert_eq!(feature.attribute("api"), Some("vma"));
    assert_eq!(feature.attribute("name"), Some("VMA_VERSION_3_0"));
    assert_eq!(feature.attribute("number"), Some("3.0"));

    let require = element(feature, "require");
    let required = |tag: &str| -> Vec<String> {
        elements(require, tag)
            .into_iter()
            .filter_map(|e| e.attribute("name").map(str::to_string))
            .collect()
    };

    let types = required("type");
    let mut emitted = type_names(&doc);
    emitted.retain(|n| n != "vk_platform" && n != "vulkan");
    assert_eq!(types, emitted);

    assert_eq!(
        required("enum"),
        ["VMA_STATS_STRING_ENABLED", "VMA_VULKAN_VERSION"]
    );
    assert_eq!(
        required("command"),
        [
            "vmaCreateAllocator",
            "vmaDestroyAllocator",
            "vmaGetAllocationInfo",
            "vmaGetVersion"
        ]
    );
}

#[test]
fn diagnostics_cover_skipped_input() {
    let diagnostics = &GENERATED.diagnostics;

    assert_eq!(diagnostics.unresolved(), ["VkAllocationCallbacks"]);
    assert_eq!(diagnostics.error_count(), 0, "{diagnostics:?}");
    assert_eq!(diagnostics.by_stage(Stage::Registry).count(), 0);

    let load: Vec<_> = diagnostics.by_stage(Stage::Load).collect();
    assert!(
        load.iter()
            .any(|d| d.identifier.as_deref() == Some("group__group__init")
                && d.message.contains("group")),
        "group index entry should be reported: {load:?}"
    );
    assert!(
        load.iter()
            .any(|d| d.identifier.as_deref() == Some("g_vmaDebugMargin")),
        "variable file member should be reported: {load:?}"
    );
    assert!(
        load.iter()
            .any(|d| d.identifier.as_deref() == Some("VMA_CALL_PRE")),
        "define without an initializer should be reported: {load:?}"
    );
    assert!(load.iter().all(|d| d.severity == Severity::Warning));
}

#[test]
fn record_count_covers_all_apis() {
    // Core, helper, and base records together.
    assert!(GENERATED.records > 40, "records: {}", GENERATED.records);
}
