//! Custom attribute discovery through `MonoCustomAttrInfo`.
//!
//! The runtime hands out custom attributes as a `MonoCustomAttrInfo` structure
//! with a fixed layout that has been stable across Mono releases:
//!
//! ```text
//! offset 0            int32   num_attrs
//! offset 4            int32   cached
//! offset 8            ptr     image
//! offset 8 + ptr      entries[num_attrs], 3 pointers each:
//!                       ptr    ctor (MonoMethod*)
//!                       uint32 data_size (padded to a pointer)
//!                       ptr    data
//! ```
//!
//! [`CustomAttributeDecoder`] walks the entries and resolves each constructor's
//! declaring class into a [`CustomAttributeRecord`]. The attribute blobs
//! themselves are not decoded.
//!
//! An info block that is not `cached` belongs to the caller and is released with
//! `mono_custom_attrs_free` after decoding; cached blocks are owned by the runtime
//! and never freed.

mod types;

pub use types::{CustomAttributeArgument, CustomAttributeNamedArgument, CustomAttributeRecord};

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    binder::NativeBinder,
    config::AttributeConfig,
    host::{io, HostEnvironment, NativePtr, NativeValue},
    invoke, Error, Result,
};

/// Decodes `MonoCustomAttrInfo` blocks into attribute records.
pub struct CustomAttributeDecoder {
    binder: Arc<NativeBinder>,
    config: AttributeConfig,
}

impl CustomAttributeDecoder {
    /// Creates a decoder on top of `binder`.
    #[must_use]
    pub fn new(binder: Arc<NativeBinder>, config: AttributeConfig) -> Self {
        CustomAttributeDecoder { binder, config }
    }

    /// Decodes the attributes listed in `info` and releases it unless cached.
    ///
    /// Entries that cannot be resolved (null constructor, unreadable memory,
    /// missing class or name) are skipped. A null `info` yields an empty list.
    /// An entry count that is negative or above
    /// [`AttributeConfig::max_entries`] is treated as damage: no entry is read
    /// and the list is empty.
    #[must_use]
    pub fn decode(&self, info: NativePtr) -> Vec<CustomAttributeRecord> {
        if info.is_null() {
            return Vec::new();
        }

        let host = self.host();
        let header = io::read_native::<i32>(host, info)
            .and_then(|count| Ok((count, io::read_native::<i32>(host, info.add(4))?)));
        let (count, cached) = match header {
            Ok(header) => header,
            Err(error) => {
                debug!(
                    target: "monoscope::attributes",
                    %info,
                    %error,
                    "unreadable custom attribute info"
                );
                return Vec::new();
            }
        };

        let records = match usize::try_from(count) {
            Ok(count) if count <= self.config.max_entries => self.read_entries(info, count),
            _ => {
                debug!(
                    target: "monoscope::attributes",
                    %info,
                    count,
                    limit = self.config.max_entries,
                    "implausible custom attribute count"
                );
                Vec::new()
            }
        };

        if cached == 0 {
            let freed = self
                .binder
                .call("mono_custom_attrs_free", &[NativeValue::Pointer(info)]);
            if let Err(error) = freed {
                debug!(
                    target: "monoscope::attributes",
                    %info,
                    %error,
                    "failed to free custom attribute info"
                );
            }
        }

        records
    }

    /// Decodes the attributes applied to a method.
    ///
    /// # Errors
    ///
    /// Returns an error if `mono_custom_attrs_from_method` cannot be called.
    pub fn decode_for_method(&self, method: NativePtr) -> Result<Vec<CustomAttributeRecord>> {
        let info = self
            .binder
            .call_pointer("mono_custom_attrs_from_method", &[NativeValue::Pointer(method)])?;
        Ok(self.decode(info))
    }

    /// Decodes the attributes applied to a class.
    ///
    /// # Errors
    ///
    /// Returns an error if `mono_custom_attrs_from_class` cannot be called.
    pub fn decode_for_class(&self, class: NativePtr) -> Result<Vec<CustomAttributeRecord>> {
        let info = self
            .binder
            .call_pointer("mono_custom_attrs_from_class", &[NativeValue::Pointer(class)])?;
        Ok(self.decode(info))
    }

    /// Decodes the attributes applied to a field of `class`.
    ///
    /// # Errors
    ///
    /// Returns an error if `mono_custom_attrs_from_field` cannot be called.
    pub fn decode_for_field(
        &self,
        class: NativePtr,
        field: NativePtr,
    ) -> Result<Vec<CustomAttributeRecord>> {
        let info = self.binder.call_pointer(
            "mono_custom_attrs_from_field",
            &[NativeValue::Pointer(class), NativeValue::Pointer(field)],
        )?;
        Ok(self.decode(info))
    }

    fn host(&self) -> &dyn HostEnvironment {
        self.binder.resolver().host().as_ref()
    }

    fn read_entries(&self, info: NativePtr, count: usize) -> Vec<CustomAttributeRecord> {
        let pointer_size = self.host().pointer_size();
        let first = info.add(8 + pointer_size);
        let stride = 3 * pointer_size;

        (0..count)
            .filter_map(|index| {
                let entry = first.add(index * stride);
                match self.read_entry(entry) {
                    Ok(record) => {
                        trace!(
                            target: "monoscope::attributes",
                            index,
                            %record,
                            "decoded custom attribute"
                        );
                        Some(record)
                    }
                    Err(error) => {
                        debug!(
                            target: "monoscope::attributes",
                            %info,
                            index,
                            %error,
                            "skipping custom attribute entry"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    fn read_entry(&self, entry: NativePtr) -> Result<CustomAttributeRecord> {
        let constructor = io::read_pointer(self.host(), entry)?;
        if constructor.is_null() {
            return Err(Error::NullResult("custom attribute constructor".to_string()));
        }

        let class = self
            .binder
            .call_pointer("mono_method_get_class", &[NativeValue::Pointer(constructor)])?;
        if class.is_null() {
            return Err(Error::NullResult("mono_method_get_class".to_string()));
        }

        let (namespace, name) = invoke::class_name(&self.binder, class)?;
        Ok(CustomAttributeRecord::new(constructor, class, name, namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::FakeMono;

    fn decoder(mono: &FakeMono) -> CustomAttributeDecoder {
        CustomAttributeDecoder::new(mono.binder(), AttributeConfig::default())
    }

    #[test]
    fn test_decode_entries() {
        let mono = FakeMono::new();
        let obsolete = mono.attribute_constructor("System", "ObsoleteAttribute");
        let marker = mono.attribute_constructor("", "MarkerAttribute");
        let info = mono.custom_attr_info(&[obsolete, marker], false);

        let records = decoder(&mono).decode(info);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].constructor, obsolete);
        assert_eq!(records[0].full_name(), "System.ObsoleteAttribute");
        assert_eq!(records[1].name, "MarkerAttribute");
        assert_eq!(records[1].namespace, "");
        assert_eq!(mono.freed_attr_infos(), vec![info]);
    }

    #[test]
    fn test_cached_info_not_freed() {
        let mono = FakeMono::new();
        let obsolete = mono.attribute_constructor("System", "ObsoleteAttribute");
        let info = mono.custom_attr_info(&[obsolete], true);

        assert_eq!(decoder(&mono).decode(info).len(), 1);
        assert!(mono.freed_attr_infos().is_empty());
        assert_eq!(mono.host.call_count("mono_custom_attrs_free"), 0);
    }

    #[test]
    fn test_empty_info_reads_no_entries() {
        let mono = FakeMono::new();
        let info = mono.custom_attr_info(&[], false);

        assert!(decoder(&mono).decode(info).is_empty());
        assert_eq!(mono.host.call_count("mono_method_get_class"), 0);
        assert_eq!(mono.freed_attr_infos(), vec![info]);
        assert!(decoder(&mono).decode(NativePtr::NULL).is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let mono = FakeMono::new();
        let obsolete = mono.attribute_constructor("System", "ObsoleteAttribute");
        let orphan = mono.orphan_method("Orphan");
        let info = mono.custom_attr_info(&[NativePtr::NULL, orphan, obsolete], false);

        let records = decoder(&mono).decode(info);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ObsoleteAttribute");
        assert_eq!(mono.freed_attr_infos(), vec![info]);
    }

    #[test]
    fn test_implausible_counts() {
        let mono = FakeMono::new();
        let info = mono.custom_attr_info(&[], false);
        mono.host.write(info, &(-1i32).to_le_bytes()).unwrap();
        assert!(decoder(&mono).decode(info).is_empty());

        let info = mono.custom_attr_info(&[], true);
        mono.host.write(info, &100_000i32.to_le_bytes()).unwrap();
        assert!(decoder(&mono).decode(info).is_empty());

        assert_eq!(mono.host.call_count("mono_method_get_class"), 0);
        // The free policy still follows the cached flag
        assert_eq!(mono.freed_attr_infos().len(), 1);
    }

    #[test]
    fn test_decode_for_method() {
        let mono = FakeMono::new();
        let serializable = mono.attribute_constructor("System", "SerializableAttribute");
        let method = mono.static_method("Save", &[], mono.void_type(), |_| Ok(NativePtr::NULL));
        mono.set_method_attributes(method, &[serializable]);

        let records = decoder(&mono).decode_for_method(method).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is("Serializable"));

        let plain = mono.static_method("Load", &[], mono.void_type(), |_| Ok(NativePtr::NULL));
        assert!(decoder(&mono).decode_for_method(plain).unwrap().is_empty());
    }

    #[test]
    fn test_thirty_two_bit_layout() {
        let mono = FakeMono::builder().with_pointer_size(4).build();
        let first = mono.attribute_constructor("System", "ObsoleteAttribute");
        let second = mono.attribute_constructor("System", "FlagsAttribute");
        let info = mono.custom_attr_info(&[first, second], false);

        let names: Vec<String> = decoder(&mono)
            .decode(info)
            .iter()
            .map(CustomAttributeRecord::full_name)
            .collect();
        assert_eq!(names, ["System.ObsoleteAttribute", "System.FlagsAttribute"]);
    }
}
