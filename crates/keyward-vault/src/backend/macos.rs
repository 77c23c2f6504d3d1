//! macOS Keychain Services backend.
//!
//! Filters are translated one-to-one into `CFDictionary` queries for
//! `SecItemAdd`, `SecItemCopyMatching`, `SecItemUpdate` and `SecItemDelete`.
//! The keychain applies its own access control and encryption; this module
//! only converts values and status codes.

use std::ffi::c_void;
use std::ptr;

use core_foundation::array::CFArray;
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::data::CFData;
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::string::{CFString, CFStringRef};
use security_framework_sys::item::{
    kSecAttrAccount, kSecAttrLabel, kSecAttrPort, kSecAttrServer, kSecClass,
    kSecClassGenericPassword, kSecClassInternetPassword, kSecMatchLimit, kSecMatchLimitAll,
    kSecMatchLimitOne, kSecReturnAttributes, kSecReturnData, kSecValueData,
};
use security_framework_sys::keychain_item::{
    SecItemAdd, SecItemCopyMatching, SecItemDelete, SecItemUpdate,
};

use super::{BackendError, SecureBackend, check_attributes};
use crate::query::{Attributes, Changes, Item, ItemClass, MatchLimit, Query};

/// `errSecSuccess`.
const ERR_SEC_SUCCESS: i32 = 0;

/// [`SecureBackend`] over the user's default keychain search list.
#[derive(Debug, Default)]
pub struct KeychainServicesBackend;

impl KeychainServicesBackend {
    pub fn new() -> Self {
        Self
    }
}

// ---------------------------------------------------------------------------
// Dictionary construction
// ---------------------------------------------------------------------------

type Pairs = Vec<(CFString, CFType)>;

fn key(raw: CFStringRef) -> CFString {
    // SAFETY: the Security framework constants are valid, immortal CFStrings.
    unsafe { CFString::wrap_under_get_rule(raw) }
}

fn class_pair(class: ItemClass) -> (CFString, CFType) {
    // SAFETY: reading extern statics exported by the Security framework.
    unsafe {
        let value = match class {
            ItemClass::InternetPassword => kSecClassInternetPassword,
            ItemClass::GenericPassword => kSecClassGenericPassword,
        };
        (key(kSecClass), key(value).into_CFType())
    }
}

fn push_attributes(attrs: &Attributes, pairs: &mut Pairs) {
    // SAFETY: reading extern statics exported by the Security framework.
    unsafe {
        if let Some(account) = &attrs.account {
            pairs.push((key(kSecAttrAccount), CFString::new(account).into_CFType()));
        }
        if let Some(server) = &attrs.server {
            pairs.push((key(kSecAttrServer), CFString::new(server).into_CFType()));
        }
        if let Some(port) = attrs.port {
            pairs.push((key(kSecAttrPort), CFNumber::from(i32::from(port)).into_CFType()));
        }
        if let Some(label) = &attrs.label {
            pairs.push((key(kSecAttrLabel), CFString::new(label).into_CFType()));
        }
    }
}

fn push_limit(limit: MatchLimit, pairs: &mut Pairs) {
    // SAFETY: reading extern statics exported by the Security framework.
    unsafe {
        let value = match limit {
            MatchLimit::One => kSecMatchLimitOne,
            MatchLimit::All => kSecMatchLimitAll,
        };
        pairs.push((key(kSecMatchLimit), key(value).into_CFType()));
    }
}

fn filter_pairs(query: &Query) -> Pairs {
    let mut pairs = vec![class_pair(query.class)];
    push_attributes(&query.attributes, &mut pairs);
    push_limit(query.limit, &mut pairs);
    pairs
}

fn dictionary(pairs: &Pairs) -> CFDictionary<CFString, CFType> {
    CFDictionary::from_CFType_pairs(pairs)
}

// ---------------------------------------------------------------------------
// Result parsing
// ---------------------------------------------------------------------------

fn check(status: i32) -> Result<(), BackendError> {
    if status == ERR_SEC_SUCCESS {
        return Ok(());
    }
    let message = security_framework::base::Error::from_code(status)
        .message()
        .unwrap_or_else(|| format!("OSStatus {status}"));
    Err(BackendError::from_status(status, message))
}

fn lookup(dict: &CFDictionary, raw_key: CFStringRef) -> Option<CFType> {
    dict.find(raw_key as *const c_void)
        // SAFETY: values of a live dictionary are valid CF objects.
        .map(|value| unsafe { CFType::wrap_under_get_rule(*value) })
}

fn item_from_dictionary(class: ItemClass, dict: &CFDictionary) -> Item {
    // SAFETY: reading extern statics exported by the Security framework.
    let (account, server, port, label, data) = unsafe {
        (
            lookup(dict, kSecAttrAccount),
            lookup(dict, kSecAttrServer),
            lookup(dict, kSecAttrPort),
            lookup(dict, kSecAttrLabel),
            lookup(dict, kSecValueData),
        )
    };

    let text = |value: Option<CFType>| {
        value
            .and_then(|v| v.downcast_into::<CFString>())
            .map(|s| s.to_string())
    };

    Item {
        class,
        attributes: Attributes {
            account: text(account),
            server: text(server),
            port: port
                .and_then(|v| v.downcast_into::<CFNumber>())
                .and_then(|n| n.to_i64())
                .and_then(|n| u16::try_from(n).ok()),
            label: text(label),
        },
        data: data
            .and_then(|v| v.downcast_into::<CFData>())
            .map(|d| d.bytes().to_vec()),
    }
}

fn items_from_result(class: ItemClass, result: CFType) -> Result<Vec<Item>, BackendError> {
    if let Some(array) = result.clone().downcast_into::<CFArray>() {
        let mut items = Vec::with_capacity(array.len() as usize);
        for value in array.iter() {
            // SAFETY: elements of a live array are valid CF objects.
            let value = unsafe { CFType::wrap_under_get_rule(*value) };
            let dict = value.downcast_into::<CFDictionary>().ok_or_else(|| {
                BackendError::internal("keychain returned a non-dictionary array element")
            })?;
            items.push(item_from_dictionary(class, &dict));
        }
        return Ok(items);
    }

    let dict = result
        .downcast_into::<CFDictionary>()
        .ok_or_else(|| BackendError::internal("keychain returned an unexpected result type"))?;
    Ok(vec![item_from_dictionary(class, &dict)])
}

// ---------------------------------------------------------------------------
// SecureBackend
// ---------------------------------------------------------------------------

impl SecureBackend for KeychainServicesBackend {
    fn name(&self) -> &'static str {
        "keychain"
    }

    fn store(&self, query: &Query, payload: &[u8]) -> Result<(), BackendError> {
        check_attributes(query.class, &query.attributes)?;

        let mut pairs = vec![class_pair(query.class)];
        push_attributes(&query.attributes, &mut pairs);
        // SAFETY: reading an extern static exported by the Security framework.
        pairs.push((
            key(unsafe { kSecValueData }),
            CFData::from_buffer(payload).into_CFType(),
        ));

        let attrs = dictionary(&pairs);
        // SAFETY: `attrs` outlives the call; no result is requested.
        let status = unsafe { SecItemAdd(attrs.as_concrete_TypeRef(), ptr::null_mut()) };
        check(status)
    }

    fn find(&self, query: &Query) -> Result<Vec<Item>, BackendError> {
        check_attributes(query.class, &query.attributes)?;

        let wants_payload = query.return_attributes || query.return_data;
        let mut pairs = filter_pairs(query);
        if wants_payload {
            // Always fetch both so the result is a dictionary; the projection
            // below trims what the caller did not ask for.
            // SAFETY: reading extern statics exported by the Security framework.
            unsafe {
                pairs.push((key(kSecReturnAttributes), CFBoolean::true_value().into_CFType()));
                pairs.push((key(kSecReturnData), CFBoolean::true_value().into_CFType()));
            }
        }
        let filter = dictionary(&pairs);

        if !wants_payload {
            // SAFETY: `filter` outlives the call; no result is requested.
            let status = unsafe { SecItemCopyMatching(filter.as_concrete_TypeRef(), ptr::null_mut()) };
            check(status)?;
            return Ok(vec![Item {
                class: query.class,
                attributes: Attributes::default(),
                data: None,
            }]);
        }

        let mut result: CFTypeRef = ptr::null();
        // SAFETY: `filter` outlives the call and `result` is a valid out slot.
        let status = unsafe { SecItemCopyMatching(filter.as_concrete_TypeRef(), &mut result) };
        check(status)?;
        if result.is_null() {
            return Err(BackendError::ItemNotFound);
        }

        // SAFETY: SecItemCopyMatching follows the create rule for `result`.
        let result = unsafe { CFType::wrap_under_create_rule(result) };
        let items = items_from_result(query.class, result)?;
        Ok(items.iter().map(|item| item.project(query)).collect())
    }

    fn update(&self, query: &Query, changes: &Changes) -> Result<(), BackendError> {
        check_attributes(query.class, &query.attributes)?;
        check_attributes(query.class, &changes.attributes)?;

        let filter = dictionary(&filter_pairs(query));

        let mut patch: Pairs = Vec::new();
        push_attributes(&changes.attributes, &mut patch);
        if let Some(data) = &changes.data {
            // SAFETY: reading an extern static exported by the Security framework.
            patch.push((
                key(unsafe { kSecValueData }),
                CFData::from_buffer(data).into_CFType(),
            ));
        }
        let patch = dictionary(&patch);

        // SAFETY: both dictionaries outlive the call.
        let status = unsafe {
            SecItemUpdate(filter.as_concrete_TypeRef(), patch.as_concrete_TypeRef())
        };
        check(status)
    }

    fn erase(&self, query: &Query) -> Result<usize, BackendError> {
        check_attributes(query.class, &query.attributes)?;

        // SecItemDelete reports no count; size the match set first.
        let mut listing = query.clone();
        listing.return_attributes = true;
        let removed = self.find(&listing)?.len();

        let filter = dictionary(&filter_pairs(query));
        // SAFETY: `filter` outlives the call.
        let status = unsafe { SecItemDelete(filter.as_concrete_TypeRef()) };
        check(status)?;
        Ok(removed)
    }
}
