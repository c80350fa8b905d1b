use super::{Body, Contact, Fixture};

use thunderdome as td;

/// Key type to look up a body stored in the physics world.
///
/// When using a [`hecs`][hecs] World, this type should be stored
/// in the world instead of [`Body`][super::Body].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyKey(pub(super) td::Index);

impl BodyKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from bodies to other things
    /// such as [`hecs`][hecs] entities.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Key type to look up a fixture stored in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FixtureKey(pub(super) td::Index);

impl FixtureKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Key type to look up a contact between two fixtures.
///
/// Contacts are created and destroyed by the world as fixtures start and stop
/// overlapping, so a key may go stale between steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContactKey(pub(super) td::Index);

impl ContactKey {
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Internal storage of the objects in the physics world.
///
/// Bodies own their fixtures, and contacts connect pairs of fixture children.
/// The connections are stored as keys on both sides: bodies list their
/// fixtures and the contacts touching them, fixtures and contacts know
/// which bodies they belong to.
#[derive(Default)]
pub struct EntitySet {
    // pub fields instead of immutable accessors,
    // there are invariants between the arenas that can be violated when inserting/removing,
    // so only the world edits these
    pub(super) bodies: td::Arena<Body>,
    pub(super) fixtures: td::Arena<Fixture>,
    pub(super) contacts: td::Arena<Contact>,
}

impl EntitySet {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Access a [`Body`][super::Body] in the physics world, if it still exists.
    #[inline]
    pub fn get_body(&self, body: BodyKey) -> Option<&Body> {
        self.bodies.get(body.0)
    }

    /// Mutably access a [`Body`][super::Body] in the physics world, if it still exists.
    #[inline]
    pub fn get_body_mut(&mut self, body: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(body.0)
    }

    /// Access a [`Fixture`][super::Fixture] in the physics world, if it still exists.
    #[inline]
    pub fn get_fixture(&self, fixture: FixtureKey) -> Option<&Fixture> {
        self.fixtures.get(fixture.0)
    }

    /// Mutably access a [`Fixture`][super::Fixture] in the physics world, if it still exists.
    #[inline]
    pub fn get_fixture_mut(&mut self, fixture: FixtureKey) -> Option<&mut Fixture> {
        self.fixtures.get_mut(fixture.0)
    }

    #[inline]
    pub fn get_contact(&self, contact: ContactKey) -> Option<&Contact> {
        self.contacts.get(contact.0)
    }

    #[inline]
    pub fn get_contact_mut(&mut self, contact: ContactKey) -> Option<&mut Contact> {
        self.contacts.get_mut(contact.0)
    }

    /// Iterate over all bodies in the world.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &Body)> {
        self.bodies.iter().map(|(k, b)| (BodyKey(k), b))
    }

    /// Iterate over all fixtures in the world.
    pub fn fixtures(&self) -> impl Iterator<Item = (FixtureKey, &Fixture)> {
        self.fixtures.iter().map(|(k, f)| (FixtureKey(k), f))
    }

    /// Iterate over all contacts in the world, including ones that aren't touching.
    pub fn contacts(&self) -> impl Iterator<Item = (ContactKey, &Contact)> {
        self.contacts.iter().map(|(k, c)| (ContactKey(k), c))
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    #[inline]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    // these are only used internally where the key is known to be valid,
    // a missing entry means the cross-references between arenas are broken

    #[inline]
    pub(super) fn body(&self, key: BodyKey) -> &Body {
        &self.bodies[key.0]
    }

    #[inline]
    pub(super) fn body_mut(&mut self, key: BodyKey) -> &mut Body {
        &mut self.bodies[key.0]
    }

    #[inline]
    pub(super) fn fixture(&self, key: FixtureKey) -> &Fixture {
        &self.fixtures[key.0]
    }

    #[inline]
    pub(super) fn fixture_mut(&mut self, key: FixtureKey) -> &mut Fixture {
        &mut self.fixtures[key.0]
    }

    #[inline]
    pub(super) fn contact(&self, key: ContactKey) -> &Contact {
        &self.contacts[key.0]
    }

    #[inline]
    pub(super) fn contact_mut(&mut self, key: ContactKey) -> &mut Contact {
        &mut self.contacts[key.0]
    }

    #[inline]
    pub(super) fn insert_body(&mut self, body: Body) -> BodyKey {
        BodyKey(self.bodies.insert(body))
    }

    #[inline]
    pub(super) fn insert_fixture(&mut self, fixture: Fixture) -> FixtureKey {
        FixtureKey(self.fixtures.insert(fixture))
    }

    #[inline]
    pub(super) fn insert_contact(&mut self, contact: Contact) -> ContactKey {
        ContactKey(self.contacts.insert(contact))
    }

    // not exposed to users, must use through World::clear
    pub(super) fn clear(&mut self) {
        self.bodies.clear();
        self.fixtures.clear();
        self.contacts.clear();
    }
}
