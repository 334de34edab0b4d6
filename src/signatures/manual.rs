//! Hand-maintained corrections and additions to the generated signature table.
//!
//! Three kinds of entries live here:
//!
//! - Alias lists for public exports that newer runtimes only ship under an
//!   `_internal` suffix (the public symbol was turned into a thin wrapper, or
//!   removed, after the runtime split into embedding and internal APIs).
//! - Internal and Unity-specific exports that no public header declares. Their
//!   types were taken from the export prologues of the legacy `mono.dll` and the
//!   `mono-2.0-bdwgc.dll` runtime; availability differs between the two.
//! - The primitive class getters used for boxing.

use crate::host::NativeType::{Pointer, Void, I32, U32};

use super::SignatureOverride;

/// Exports whose `<name>_internal` variant may be the only one present.
const INTERNAL_ALIASED: &[&str] = &[
    "mono_get_root_domain",
    "mono_thread_attach",
    "mono_thread_detach",
    "mono_domain_set",
    "mono_assembly_get_image",
    "mono_assembly_get_name",
    "mono_class_from_mono_type",
    "mono_method_signature",
    "mono_object_get_size",
    "mono_object_get_vtable",
    "mono_threads_enter_gc_safe_region",
    "mono_threads_exit_gc_safe_region",
    "mono_threads_exit_gc_unsafe_region",
    "mono_vtable_class",
    "mono_vtable_domain",
];

/// Primitive class getters, by managed type name.
pub const CLASS_GETTERS: &[&str] = &[
    "array",
    "boolean",
    "byte",
    "char",
    "double",
    "enum",
    "exception",
    "int16",
    "int32",
    "int64",
    "intptr",
    "object",
    "sbyte",
    "single",
    "string",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
    "void",
];

/// Returns the built-in override table.
#[must_use]
pub fn overrides() -> Vec<SignatureOverride> {
    let mut overrides: Vec<SignatureOverride> = INTERNAL_ALIASED
        .iter()
        .map(|name| SignatureOverride {
            name: (*name).to_string(),
            aliases: vec![format!("{name}_internal")],
            signature: None,
        })
        .collect();

    // Renamed in the bleeding edge runtime; legacy builds only have the handle variant
    overrides.push(
        SignatureOverride::declare("mono_reflection_type_get_type", Pointer, &[Pointer])
            .with_aliases(&["mono_reflection_type_get_handle"]),
    );

    overrides.extend(
        CLASS_GETTERS
            .iter()
            .map(|name| SignatureOverride::declare(format!("mono_get_{name}_class"), Pointer, &[])),
    );

    overrides.extend([
        // Internal runtime exports
        SignatureOverride::declare("mono_class_is_generic", I32, &[Pointer]),
        SignatureOverride::declare("mono_class_is_inflated", I32, &[Pointer]),
        SignatureOverride::declare("mono_class_is_blittable", I32, &[Pointer]),
        SignatureOverride::declare(
            "mono_class_inflate_generic_method",
            Pointer,
            &[Pointer, Pointer],
        ),
        SignatureOverride::declare(
            "mono_class_inflate_generic_method_full",
            Pointer,
            &[Pointer, Pointer, Pointer],
        ),
        SignatureOverride::declare("mono_get_inflated_method", Pointer, &[Pointer]),
        SignatureOverride::declare("mono_method_get_generic_container", Pointer, &[Pointer]),
        SignatureOverride::declare("mono_type_is_generic_parameter", I32, &[Pointer]),
        SignatureOverride::declare("mono_assembly_name_parse", I32, &[Pointer, Pointer]),
        SignatureOverride::declare("mono_class_get_userdata", Pointer, &[Pointer]),
        SignatureOverride::declare("mono_class_get_userdata_offset", I32, &[]),
        SignatureOverride::declare("mono_class_set_userdata", Void, &[Pointer, Pointer]),
        SignatureOverride::declare("mono_gchandle_is_in_domain", I32, &[U32, Pointer]),
        SignatureOverride::declare("mono_runtime_unhandled_exception_policy_set", Void, &[I32]),
        SignatureOverride::declare("mono_security_set_mode", Void, &[I32]),
        SignatureOverride::declare("mono_set_assemblies_path_null_separated", Void, &[Pointer]),
        SignatureOverride::declare("mono_thread_pool_cleanup", Void, &[]),
        SignatureOverride::declare("mono_thread_pop_appdomain_ref", Void, &[]),
        SignatureOverride::declare("mono_profiler_install", Void, &[Pointer, Pointer]),
        SignatureOverride::declare("mono_profiler_install_thread", Void, &[Pointer, Pointer]),
        SignatureOverride::declare("mono_profiler_install_allocation", Void, &[Pointer]),
        SignatureOverride::declare("mono_profiler_set_events", Void, &[I32]),
        // Custom attribute helpers
        SignatureOverride::declare("mono_custom_attrs_get_attrs", Pointer, &[Pointer, Pointer]),
        // Unity runtime
        SignatureOverride::declare("mono_unity_class_get_generic_parameter_count", I32, &[Pointer]),
        SignatureOverride::declare(
            "mono_unity_class_get_generic_parameter_at",
            Pointer,
            &[Pointer, I32],
        ),
        SignatureOverride::declare(
            "mono_unity_class_get_generic_type_definition",
            Pointer,
            &[Pointer],
        ),
        SignatureOverride::declare("mono_unity_class_get_generic_argument_count", I32, &[Pointer]),
        SignatureOverride::declare(
            "mono_unity_class_get_generic_argument_at",
            Pointer,
            &[Pointer, I32],
        ),
        SignatureOverride::declare("unity_mono_method_is_generic", I32, &[Pointer]),
        SignatureOverride::declare("unity_mono_method_is_inflated", I32, &[Pointer]),
        SignatureOverride::declare("unity_mono_reflection_method_get_method", Pointer, &[Pointer]),
        SignatureOverride::declare("mono_unity_class_is_abstract", I32, &[Pointer]),
        SignatureOverride::declare("mono_unity_class_is_interface", I32, &[Pointer]),
        SignatureOverride::declare("mono_unity_thread_fast_attach", Void, &[Pointer]),
        SignatureOverride::declare("mono_unity_thread_fast_detach", Void, &[]),
        SignatureOverride::declare("mono_unity_object_new", Pointer, &[Pointer, Pointer]),
        SignatureOverride::declare(
            "mono_unity_runtime_invoke",
            Pointer,
            &[Pointer, Pointer, Pointer, Pointer],
        ),
        SignatureOverride::declare("mono_unity_string_new", Pointer, &[Pointer, Pointer]),
        SignatureOverride::declare("mono_unity_array_new", Pointer, &[Pointer, Pointer, I32]),
        SignatureOverride::declare(
            "mono_unity_array_new_2d",
            Pointer,
            &[Pointer, Pointer, I32, I32],
        ),
        SignatureOverride::declare(
            "mono_unity_array_new_3d",
            Pointer,
            &[Pointer, Pointer, I32, I32, I32],
        ),
        SignatureOverride::declare(
            "mono_unity_liveness_allocate_struct",
            Pointer,
            &[Pointer, I32, Pointer, Pointer, Pointer],
        ),
        SignatureOverride::declare("mono_unity_liveness_stop_gc_world", Void, &[Pointer]),
        SignatureOverride::declare("mono_unity_liveness_finalize", Void, &[Pointer]),
        SignatureOverride::declare("mono_unity_liveness_start_gc_world", Void, &[Pointer]),
        SignatureOverride::declare("mono_unity_liveness_free_struct", Void, &[Pointer]),
        SignatureOverride::declare(
            "mono_unity_liveness_calculation_from_root",
            Void,
            &[Pointer, Pointer],
        ),
        SignatureOverride::declare(
            "mono_unity_liveness_calculation_from_statics",
            Void,
            &[Pointer],
        ),
        SignatureOverride::declare("mono_unity_get_unitytls_interface", Pointer, &[]),
        SignatureOverride::declare(
            "mono_unity_loader_get_last_error_and_error_prepare_exception",
            Pointer,
            &[Pointer],
        ),
    ]);

    overrides
}
