//! Signatures derived from the public Mono embedding headers.
//!
//! C types are mapped onto [`NativeType`] tags: every pointer (including opaque
//! `Mono*` handles and `char*`) is `pointer`, `mono_bool`/`gboolean`/enums are
//! `int`, `guint*` are `uint`, `uintptr_t`/`size_t` are `size_t`.

use crate::host::NativeType::{self, Pointer, USize, Void, I32, I64, U32};

type Entry = (&'static str, NativeType, &'static [NativeType]);

pub(crate) const GENERATED: &[Entry] = &[
    // Domains
    ("mono_get_root_domain", Pointer, &[]),
    ("mono_domain_get", Pointer, &[]),
    ("mono_domain_set", I32, &[Pointer, I32]),
    ("mono_domain_get_by_id", Pointer, &[I32]),
    ("mono_domain_get_id", I32, &[Pointer]),
    ("mono_domain_get_friendly_name", Pointer, &[Pointer]),
    ("mono_domain_assembly_open", Pointer, &[Pointer, Pointer]),
    ("mono_domain_foreach", Void, &[Pointer, Pointer]),
    ("mono_domain_create_appdomain", Pointer, &[Pointer, Pointer]),
    ("mono_domain_unload", Void, &[Pointer]),
    // Threads
    ("mono_thread_attach", Pointer, &[Pointer]),
    ("mono_thread_detach", Void, &[Pointer]),
    ("mono_thread_current", Pointer, &[]),
    ("mono_thread_get_main", Pointer, &[]),
    ("mono_thread_exit", Void, &[]),
    ("mono_thread_set_main", Void, &[Pointer]),
    ("mono_jit_thread_attach", Pointer, &[Pointer]),
    ("mono_threads_enter_gc_safe_region", Pointer, &[Pointer]),
    ("mono_threads_exit_gc_safe_region", Void, &[Pointer, Pointer]),
    ("mono_threads_enter_gc_unsafe_region", Pointer, &[Pointer]),
    ("mono_threads_exit_gc_unsafe_region", Void, &[Pointer, Pointer]),
    // JIT
    ("mono_jit_init", Pointer, &[Pointer]),
    ("mono_jit_init_version", Pointer, &[Pointer, Pointer]),
    ("mono_jit_cleanup", Void, &[Pointer]),
    ("mono_jit_info_table_find", Pointer, &[Pointer, Pointer]),
    ("mono_jit_info_get_method", Pointer, &[Pointer]),
    ("mono_jit_info_get_code_start", Pointer, &[Pointer]),
    ("mono_jit_info_get_code_size", I32, &[Pointer]),
    ("mono_compile_method", Pointer, &[Pointer]),
    ("mono_set_assemblies_path", Void, &[Pointer]),
    // Assemblies and images
    ("mono_assembly_foreach", Void, &[Pointer, Pointer]),
    ("mono_assembly_get_image", Pointer, &[Pointer]),
    ("mono_assembly_get_name", Pointer, &[Pointer]),
    ("mono_assembly_open", Pointer, &[Pointer, Pointer]),
    ("mono_assembly_load_from_full", Pointer, &[Pointer, Pointer, Pointer, I32]),
    ("mono_assembly_loaded", Pointer, &[Pointer]),
    ("mono_assembly_name_get_name", Pointer, &[Pointer]),
    ("mono_assembly_name_get_culture", Pointer, &[Pointer]),
    ("mono_assembly_name_get_version", U32, &[Pointer, Pointer, Pointer, Pointer]),
    ("mono_image_get_name", Pointer, &[Pointer]),
    ("mono_image_get_filename", Pointer, &[Pointer]),
    ("mono_image_get_assembly", Pointer, &[Pointer]),
    ("mono_image_get_table_rows", I32, &[Pointer, I32]),
    ("mono_image_loaded", Pointer, &[Pointer]),
    ("mono_get_corlib", Pointer, &[]),
    // Classes
    ("mono_class_from_name", Pointer, &[Pointer, Pointer, Pointer]),
    ("mono_class_from_name_case", Pointer, &[Pointer, Pointer, Pointer]),
    ("mono_class_from_mono_type", Pointer, &[Pointer]),
    ("mono_class_get", Pointer, &[Pointer, U32]),
    ("mono_class_get_name", Pointer, &[Pointer]),
    ("mono_class_get_namespace", Pointer, &[Pointer]),
    ("mono_class_get_parent", Pointer, &[Pointer]),
    ("mono_class_get_nesting_type", Pointer, &[Pointer]),
    ("mono_class_get_image", Pointer, &[Pointer]),
    ("mono_class_get_type", Pointer, &[Pointer]),
    ("mono_class_get_type_token", U32, &[Pointer]),
    ("mono_class_get_flags", U32, &[Pointer]),
    ("mono_class_get_rank", I32, &[Pointer]),
    ("mono_class_get_element_class", Pointer, &[Pointer]),
    ("mono_class_get_methods", Pointer, &[Pointer, Pointer]),
    ("mono_class_get_fields", Pointer, &[Pointer, Pointer]),
    ("mono_class_get_properties", Pointer, &[Pointer, Pointer]),
    ("mono_class_get_events", Pointer, &[Pointer, Pointer]),
    ("mono_class_get_interfaces", Pointer, &[Pointer, Pointer]),
    ("mono_class_get_nested_types", Pointer, &[Pointer, Pointer]),
    ("mono_class_get_method_from_name", Pointer, &[Pointer, Pointer, I32]),
    ("mono_class_get_field_from_name", Pointer, &[Pointer, Pointer]),
    ("mono_class_get_property_from_name", Pointer, &[Pointer, Pointer]),
    ("mono_class_get_field", Pointer, &[Pointer, U32]),
    ("mono_class_num_methods", I32, &[Pointer]),
    ("mono_class_num_fields", I32, &[Pointer]),
    ("mono_class_num_properties", I32, &[Pointer]),
    ("mono_class_init", I32, &[Pointer]),
    ("mono_class_instance_size", I32, &[Pointer]),
    ("mono_class_value_size", I32, &[Pointer, Pointer]),
    ("mono_class_array_element_size", I32, &[Pointer]),
    ("mono_class_is_enum", I32, &[Pointer]),
    ("mono_class_is_valuetype", I32, &[Pointer]),
    ("mono_class_is_delegate", I32, &[Pointer]),
    ("mono_class_is_subclass_of", I32, &[Pointer, Pointer, I32]),
    ("mono_class_is_assignable_from", I32, &[Pointer, Pointer]),
    ("mono_class_enum_basetype", Pointer, &[Pointer]),
    ("mono_class_vtable", Pointer, &[Pointer, Pointer]),
    ("mono_class_get_method_from_name_flags", Pointer, &[Pointer, Pointer, I32, I32]),
    ("mono_vtable_class", Pointer, &[Pointer]),
    ("mono_vtable_domain", Pointer, &[Pointer]),
    // Fields
    ("mono_field_get_name", Pointer, &[Pointer]),
    ("mono_field_get_type", Pointer, &[Pointer]),
    ("mono_field_get_parent", Pointer, &[Pointer]),
    ("mono_field_get_offset", U32, &[Pointer]),
    ("mono_field_get_flags", U32, &[Pointer]),
    ("mono_field_get_value", Void, &[Pointer, Pointer, Pointer]),
    ("mono_field_set_value", Void, &[Pointer, Pointer, Pointer]),
    ("mono_field_static_get_value", Void, &[Pointer, Pointer, Pointer]),
    ("mono_field_static_set_value", Void, &[Pointer, Pointer, Pointer]),
    ("mono_field_get_value_object", Pointer, &[Pointer, Pointer, Pointer]),
    // Properties and events
    ("mono_property_get_name", Pointer, &[Pointer]),
    ("mono_property_get_get_method", Pointer, &[Pointer]),
    ("mono_property_get_set_method", Pointer, &[Pointer]),
    ("mono_property_get_parent", Pointer, &[Pointer]),
    ("mono_property_get_flags", U32, &[Pointer]),
    ("mono_property_get_value", Pointer, &[Pointer, Pointer, Pointer, Pointer]),
    ("mono_property_set_value", Void, &[Pointer, Pointer, Pointer, Pointer]),
    ("mono_event_get_name", Pointer, &[Pointer]),
    ("mono_event_get_add_method", Pointer, &[Pointer]),
    ("mono_event_get_remove_method", Pointer, &[Pointer]),
    // Methods and signatures
    ("mono_method_get_name", Pointer, &[Pointer]),
    ("mono_method_get_class", Pointer, &[Pointer]),
    ("mono_method_get_flags", U32, &[Pointer, Pointer]),
    ("mono_method_get_token", U32, &[Pointer]),
    ("mono_method_signature", Pointer, &[Pointer]),
    ("mono_method_full_name", Pointer, &[Pointer, I32]),
    ("mono_method_get_param_names", Void, &[Pointer, Pointer]),
    ("mono_method_get_object", Pointer, &[Pointer, Pointer, Pointer]),
    ("mono_method_get_unmanaged_thunk", Pointer, &[Pointer]),
    ("mono_method_desc_new", Pointer, &[Pointer, I32]),
    ("mono_method_desc_free", Void, &[Pointer]),
    ("mono_method_desc_search_in_class", Pointer, &[Pointer, Pointer]),
    ("mono_method_desc_search_in_image", Pointer, &[Pointer, Pointer]),
    ("mono_signature_get_params", Pointer, &[Pointer, Pointer]),
    ("mono_signature_get_param_count", U32, &[Pointer]),
    ("mono_signature_get_return_type", Pointer, &[Pointer]),
    ("mono_signature_is_instance", I32, &[Pointer]),
    ("mono_signature_get_call_conv", U32, &[Pointer]),
    ("mono_signature_get_desc", Pointer, &[Pointer, I32]),
    // Types
    ("mono_type_get_type", I32, &[Pointer]),
    ("mono_type_get_name", Pointer, &[Pointer]),
    ("mono_type_get_class", Pointer, &[Pointer]),
    ("mono_type_get_object", Pointer, &[Pointer, Pointer]),
    ("mono_type_get_underlying_type", Pointer, &[Pointer]),
    ("mono_type_is_byref", I32, &[Pointer]),
    ("mono_type_is_reference", I32, &[Pointer]),
    ("mono_type_is_pointer", I32, &[Pointer]),
    ("mono_type_is_struct", I32, &[Pointer]),
    ("mono_type_size", I32, &[Pointer, Pointer]),
    ("mono_reflection_type_from_name", Pointer, &[Pointer, Pointer]),
    // Objects
    ("mono_object_new", Pointer, &[Pointer, Pointer]),
    ("mono_object_clone", Pointer, &[Pointer]),
    ("mono_object_get_class", Pointer, &[Pointer]),
    ("mono_object_get_domain", Pointer, &[Pointer]),
    ("mono_object_get_size", U32, &[Pointer]),
    ("mono_object_get_vtable", Pointer, &[Pointer]),
    ("mono_object_get_virtual_method", Pointer, &[Pointer, Pointer]),
    ("mono_object_hash", U32, &[Pointer]),
    ("mono_object_isinst", Pointer, &[Pointer, Pointer]),
    ("mono_object_to_string", Pointer, &[Pointer, Pointer]),
    ("mono_object_unbox", Pointer, &[Pointer]),
    ("mono_value_box", Pointer, &[Pointer, Pointer, Pointer]),
    ("mono_value_copy", Void, &[Pointer, Pointer, Pointer]),
    // Invocation
    ("mono_runtime_invoke", Pointer, &[Pointer, Pointer, Pointer, Pointer]),
    ("mono_runtime_invoke_array", Pointer, &[Pointer, Pointer, Pointer, Pointer]),
    ("mono_runtime_object_init", Void, &[Pointer]),
    ("mono_runtime_class_init", Void, &[Pointer]),
    ("mono_runtime_delegate_invoke", Pointer, &[Pointer, Pointer, Pointer]),
    ("mono_add_internal_call", Void, &[Pointer, Pointer]),
    ("mono_lookup_internal_call", Pointer, &[Pointer]),
    // Strings
    ("mono_string_new", Pointer, &[Pointer, Pointer]),
    ("mono_string_new_len", Pointer, &[Pointer, Pointer, U32]),
    ("mono_string_new_utf16", Pointer, &[Pointer, Pointer, I32]),
    ("mono_string_new_wrapper", Pointer, &[Pointer]),
    ("mono_string_empty", Pointer, &[Pointer]),
    ("mono_string_to_utf8", Pointer, &[Pointer]),
    ("mono_string_to_utf16", Pointer, &[Pointer]),
    ("mono_string_chars", Pointer, &[Pointer]),
    ("mono_string_length", I32, &[Pointer]),
    ("mono_string_equal", I32, &[Pointer, Pointer]),
    ("mono_string_hash", U32, &[Pointer]),
    ("mono_free", Void, &[Pointer]),
    // Arrays
    ("mono_array_new", Pointer, &[Pointer, Pointer, USize]),
    ("mono_array_length", USize, &[Pointer]),
    ("mono_array_addr_with_size", Pointer, &[Pointer, I32, USize]),
    ("mono_array_element_size", I32, &[Pointer]),
    ("mono_array_clone", Pointer, &[Pointer]),
    // Exceptions
    ("mono_raise_exception", Void, &[Pointer]),
    ("mono_exception_from_name_msg", Pointer, &[Pointer, Pointer, Pointer, Pointer]),
    ("mono_get_exception_argument_null", Pointer, &[Pointer]),
    ("mono_get_exception_null_reference", Pointer, &[]),
    ("mono_print_unhandled_exception", Void, &[Pointer]),
    // GC
    ("mono_gchandle_new", U32, &[Pointer, I32]),
    ("mono_gchandle_new_weakref", U32, &[Pointer, I32]),
    ("mono_gchandle_get_target", Pointer, &[U32]),
    ("mono_gchandle_free", Void, &[U32]),
    ("mono_gc_collect", Void, &[I32]),
    ("mono_gc_max_generation", I32, &[]),
    ("mono_gc_get_heap_size", I64, &[]),
    ("mono_gc_get_used_size", I64, &[]),
    // Custom attributes
    ("mono_custom_attrs_from_method", Pointer, &[Pointer]),
    ("mono_custom_attrs_from_class", Pointer, &[Pointer]),
    ("mono_custom_attrs_from_field", Pointer, &[Pointer, Pointer]),
    ("mono_custom_attrs_from_property", Pointer, &[Pointer, Pointer]),
    ("mono_custom_attrs_from_event", Pointer, &[Pointer, Pointer]),
    ("mono_custom_attrs_from_assembly", Pointer, &[Pointer]),
    ("mono_custom_attrs_from_param", Pointer, &[Pointer, U32]),
    ("mono_custom_attrs_has_attr", I32, &[Pointer, Pointer]),
    ("mono_custom_attrs_get_attr", Pointer, &[Pointer, Pointer]),
    ("mono_custom_attrs_construct", Pointer, &[Pointer]),
    ("mono_custom_attrs_free", Void, &[Pointer]),
    // Debugging
    ("mono_debug_init", Void, &[I32]),
    ("mono_debug_enabled", I32, &[]),
    ("mono_stack_walk", Void, &[Pointer, Pointer]),
    ("mono_get_runtime_build_info", Pointer, &[]),
    ("mono_trace_set_level_string", Void, &[Pointer]),
];
