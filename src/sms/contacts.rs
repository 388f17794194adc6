// src/sms/contacts.rs
//! Mapping of SMS senders to contacts of the signed-in user.

use anyhow::Result;
use log::{debug, info};

use crate::config::SmsAccount;
use crate::models::{Entity, User};
use crate::phone::PhoneNumber;
use crate::services::UserService;

/// First contact whose primary phone, or failing that any additional
/// phone, is the same number as `phone`
pub fn find_contact_by_phone<'a>(phone: &PhoneNumber, contacts: &'a [User]) -> Option<&'a User> {
    contacts.iter().find(|contact| {
        let primary = contact.phone.as_deref().map_or(false, |p| phone.same_as(p));
        primary || contact.phone_numbers().any(|p| phone.same_as(p))
    })
}

/// Contact synthesized for a sender nobody knows yet. The id is derived
/// from the account and the number, so the same sender always maps to the
/// same contact.
pub fn contact_for_phone(account_id: &str, phone: &PhoneNumber) -> User {
    let number = phone.number();
    let mut contact = User::new(Entity::new(account_id, number.clone()));
    contact.first_name = number.clone();

    // Alphanumeric senders ("BANK") get no phone properties
    if phone.is_valid() {
        contact.phone = Some(number.clone());
        contact.phones = vec![number];
    }
    contact
}

/// Resolve the contact behind `address`, creating and merging a new one if
/// needed. `contacts` is the contact list already fetched for this intent and
/// is extended with any created contact.
pub fn find_or_create_contact(
    account: &SmsAccount,
    address: &str,
    contacts: &mut Vec<User>,
    users: &dyn UserService,
) -> Result<User> {
    let phone = PhoneNumber::new(address);

    if let Some(contact) = find_contact_by_phone(&phone, contacts) {
        debug!("Sender {} is contact {}", address, contact.entity);
        return Ok(contact.clone());
    }

    let contact = contact_for_phone(&account.id, &phone);
    if let Some(existing) = contacts.iter().find(|c| c.entity == contact.entity) {
        debug!("Sender {} already has synthesized contact {}", address, existing.entity);
        return Ok(existing.clone());
    }

    info!("Creating contact {} for unknown sender {}", contact.entity, address);
    users.merge_user_contacts(&account.user.entity, vec![contact.clone()])?;
    contacts.push(contact.clone());

    Ok(contact)
}
