//! Auth and cart collaborators injected into the checkout workflow.
//!
//! The checkout never reaches for global state: the environment carries an
//! [`AuthSession`] and a [`CartStore`], and tests hand in the in-memory
//! versions below.

use crate::types::CartItem;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

/// A logged-in user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// User id
    pub id: String,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Bearer token for API calls
    #[serde(skip_serializing)]
    pub token: String,
}

/// Who is checking out
pub trait AuthSession: Send + Sync {
    /// The current user, if logged in
    fn current_user(&self) -> Option<AuthenticatedUser>;

    /// Bearer token to attach to API calls
    fn bearer_token(&self) -> Option<String> {
        self.current_user().map(|user| user.token)
    }

    /// True when a user is logged in
    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }
}

/// The shopper's cart, read by checkout and cleared after a successful order
pub trait CartStore: Send + Sync {
    /// Snapshot of the cart lines
    fn items(&self) -> Vec<CartItem>;

    /// Empty the cart
    fn clear(&self);

    /// True when the cart has no lines
    fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

/// Auth session held in memory; starts logged out unless given a user
#[derive(Debug, Default)]
pub struct InMemoryAuth {
    user: RwLock<Option<AuthenticatedUser>>,
}

impl InMemoryAuth {
    /// Logged-out session
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Session logged in as `user`
    #[must_use]
    pub fn logged_in(user: AuthenticatedUser) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    /// Log a user in
    pub fn log_in(&self, user: AuthenticatedUser) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    /// Log the current user out
    pub fn log_out(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl AuthSession for InMemoryAuth {
    fn current_user(&self) -> Option<AuthenticatedUser> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Cart held in memory
#[derive(Debug, Default)]
pub struct InMemoryCart {
    items: Mutex<Vec<CartItem>>,
}

impl InMemoryCart {
    /// Empty cart
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cart pre-filled with lines
    #[must_use]
    pub fn with_items(items: Vec<CartItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    fn lines(&self) -> MutexGuard<'_, Vec<CartItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a line, merging quantities when the id is already present
    pub fn add_item(&self, item: CartItem) {
        let mut lines = self.lines();
        match lines.iter_mut().find(|line| line.id == item.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => lines.push(item),
        }
    }

    /// Set the quantity of a line; zero removes it
    pub fn update_quantity(&self, id: &str, quantity: u32) {
        let mut lines = self.lines();
        if quantity == 0 {
            lines.retain(|line| line.id != id);
        } else if let Some(line) = lines.iter_mut().find(|line| line.id == id) {
            line.quantity = quantity;
        }
    }

    /// Remove a line
    pub fn remove_item(&self, id: &str) {
        self.lines().retain(|line| line.id != id);
    }

    /// Total number of tickets across lines
    #[must_use]
    pub fn ticket_count(&self) -> u32 {
        self.lines()
            .iter()
            .fold(0, |count, line| count.saturating_add(line.quantity))
    }
}

impl CartStore for InMemoryCart {
    fn items(&self) -> Vec<CartItem> {
        self.lines().clone()
    }

    fn clear(&self) {
        self.lines().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Money;

    fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: "u-1".to_string(),
            name: "Amina".to_string(),
            email: "amina@example.com".to_string(),
            token: "tok".to_string(),
        }
    }

    #[test]
    fn auth_session_tracks_login_state() {
        let auth = InMemoryAuth::anonymous();
        assert!(!auth.is_authenticated());
        assert_eq!(auth.bearer_token(), None);

        auth.log_in(user());
        assert!(auth.is_authenticated());
        assert_eq!(auth.bearer_token().as_deref(), Some("tok"));

        auth.log_out();
        assert!(auth.current_user().is_none());
    }

    #[test]
    fn cart_merges_and_updates_lines() {
        let cart = InMemoryCart::new();
        cart.add_item(CartItem::new("evt-1", "Jazz Night", Money::from_major(20), 1));
        cart.add_item(CartItem::new("evt-1", "Jazz Night", Money::from_major(20), 2));
        cart.add_item(CartItem::new("evt-2", "Food Fest", Money::from_major(5), 1));

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.ticket_count(), 4);

        cart.update_quantity("evt-2", 0);
        assert_eq!(cart.items().len(), 1);

        cart.clear();
        assert!(cart.is_empty());
    }
}
