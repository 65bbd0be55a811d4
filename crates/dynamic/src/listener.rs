//! Listener registries and their lifetime handles.
//!
//! A [`ListenerSet`] keeps callbacks in registration order. Each entry is
//! owned either by a [`ListenerToken`] (removed synchronously when the token
//! drops) or by a context object held through a `Weak` (dead once the
//! context is gone, purged the next time the set is touched).
//!
//! Notification works on a snapshot of the live callbacks, so callbacks may
//! register or drop listeners on the same set without re-entrancy hazards.
//! Such changes take effect from the next notification.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

enum Owner {
    Token,
    Context(Weak<dyn Any>),
}

impl Owner {
    fn is_alive(&self) -> bool {
        match self {
            Owner::Token => true,
            Owner::Context(context) => context.strong_count() > 0,
        }
    }
}

struct Entry<F: ?Sized> {
    id: u64,
    owner: Owner,
    callback: Rc<F>,
}

struct Entries<F: ?Sized> {
    next_id: u64,
    list: Vec<Entry<F>>,
}

impl<F: ?Sized> Entries<F> {
    fn insert(&mut self, owner: Owner, callback: Rc<F>) -> u64 {
        self.purge();
        let id = self.next_id;
        self.next_id += 1;
        self.list.push(Entry {
            id,
            owner,
            callback,
        });
        id
    }

    fn purge(&mut self) {
        let before = self.list.len();
        self.list.retain(|entry| entry.owner.is_alive());
        let removed = before - self.list.len();
        if removed > 0 {
            tracing::debug!(removed, "purged listeners of dropped contexts");
        }
    }
}

trait Deregister {
    fn deregister(&self, id: u64);
}

impl<F: ?Sized> Deregister for RefCell<Entries<F>> {
    fn deregister(&self, id: u64) {
        self.borrow_mut().list.retain(|entry| entry.id != id);
    }
}

/// Ordered collection of callbacks of one signature.
pub(crate) struct ListenerSet<F: ?Sized> {
    inner: Rc<RefCell<Entries<F>>>,
}

impl<F: ?Sized + 'static> ListenerSet<F> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Entries {
                next_id: 0,
                list: Vec::new(),
            })),
        }
    }

    /// Register a callback that lives until the returned token is dropped.
    pub(crate) fn add(&self, callback: Rc<F>) -> ListenerToken {
        let id = self.inner.borrow_mut().insert(Owner::Token, callback);
        let erased: Rc<dyn Deregister> = self.inner.clone();
        ListenerToken {
            registration: Some((Rc::downgrade(&erased), id)),
        }
    }

    /// Register a callback that lives as long as `context` does.
    pub(crate) fn add_bound<C: 'static>(&self, context: &Rc<C>, callback: Rc<F>) {
        let context: Rc<dyn Any> = context.clone();
        self.inner
            .borrow_mut()
            .insert(Owner::Context(Rc::downgrade(&context)), callback);
    }

    /// Live callbacks in registration order. Dead entries are dropped first.
    pub(crate) fn snapshot(&self) -> Vec<Rc<F>> {
        let mut entries = self.inner.borrow_mut();
        if entries.list.is_empty() {
            return Vec::new();
        }
        entries.purge();
        entries
            .list
            .iter()
            .map(|entry| Rc::clone(&entry.callback))
            .collect()
    }

    /// A second handle on the same registry.
    pub(crate) fn share(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }

    pub(crate) fn same_registry(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live entries.
    pub(crate) fn len(&self) -> usize {
        self.inner
            .borrow()
            .list
            .iter()
            .filter(|entry| entry.owner.is_alive())
            .count()
    }
}

impl<F: ?Sized + 'static> Default for ListenerSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a registered listener.
///
/// Dropping the token removes the listener immediately. Tokens can be moved
/// but not copied; a default token owns nothing. A token that outlives the
/// node it was issued by is harmless.
#[must_use = "the listener is removed as soon as the token is dropped"]
#[derive(Default)]
pub struct ListenerToken {
    registration: Option<(Weak<dyn Deregister>, u64)>,
}

impl ListenerToken {
    /// A token that owns no listener.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the listener is still registered on a live node.
    pub fn is_active(&self) -> bool {
        matches!(&self.registration, Some((set, _)) if set.strong_count() > 0)
    }

    /// Remove the listener now. Equivalent to dropping the token.
    pub fn release(mut self) {
        self.deregister();
    }

    fn deregister(&mut self) {
        if let Some((set, id)) = self.registration.take() {
            if let Some(set) = set.upgrade() {
                set.deregister(id);
            }
        }
    }
}

impl Drop for ListenerToken {
    fn drop(&mut self) {
        self.deregister();
    }
}

impl fmt::Debug for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerToken")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Owner-side bag of tokens.
///
/// An object that watches several nodes keeps its tokens here; dropping the
/// object (or calling [`clear`](Subscriptions::clear)) detaches all of its
/// listeners at once.
#[derive(Debug, Default)]
pub struct Subscriptions {
    tokens: Vec<ListenerToken>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: ListenerToken) {
        self.tokens.push(token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }
}

impl Extend<ListenerToken> for Subscriptions {
    fn extend<I: IntoIterator<Item = ListenerToken>>(&mut self, iter: I) {
        self.tokens.extend(iter);
    }
}

impl FromIterator<ListenerToken> for Subscriptions {
    fn from_iter<I: IntoIterator<Item = ListenerToken>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}
