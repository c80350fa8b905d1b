//! Contacts between fixtures and the bookkeeping that creates, updates
//! and destroys them as the broad phase reports pairs.

use super::{
    collision::{
        self, narrowphase::shape_rank, BroadPhase, Manifold, WorldManifold,
    },
    fixture::FixtureProxyRef,
    BodyKey, BodyType, ContactKey, EntitySet, Fixture, FixtureKey,
};
use crate::settings::{mix_friction, mix_restitution, MAX_MANIFOLD_POINTS};

/// An entry in a body's list of contacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactEdge {
    /// The other body in the contact.
    pub other: BodyKey,
    pub contact: ContactKey,
}

/// A potential contact between children of two fixtures,
/// existing while their AABBs in the broad phase overlap.
///
/// The manifold is kept between steps so that the impulses it accumulates
/// can be used to warm start the solver on the next step.
#[derive(Clone, Debug)]
pub struct Contact {
    pub(crate) fixture_a: FixtureKey,
    pub(crate) child_a: usize,
    pub(crate) fixture_b: FixtureKey,
    pub(crate) child_b: usize,
    pub(crate) body_a: BodyKey,
    pub(crate) body_b: BodyKey,
    pub(crate) manifold: Manifold,
    pub(crate) friction: f64,
    pub(crate) restitution: f64,

    pub(crate) touching: bool,
    /// Can be turned off by the user for a single step in `pre_solve`.
    pub(crate) enabled: bool,
    /// Set when a fixture's filter changed, the pair is re-checked on the next collide.
    pub(crate) filter_dirty: bool,
    pub(crate) in_island: bool,
    /// Whether `toi` holds a valid time of impact for this step.
    pub(crate) toi_valid: bool,
    pub(crate) toi_count: u32,
    pub(crate) toi: f64,
}

impl Contact {
    fn new(set: &EntitySet, proxy_a: FixtureProxyRef, proxy_b: FixtureProxyRef) -> Self {
        let fixture_a = set.fixture(proxy_a.fixture);
        let fixture_b = set.fixture(proxy_b.fixture);
        Self {
            fixture_a: proxy_a.fixture,
            child_a: proxy_a.child,
            fixture_b: proxy_b.fixture,
            child_b: proxy_b.child,
            body_a: fixture_a.body,
            body_b: fixture_b.body,
            manifold: Manifold::default(),
            friction: mix_friction(fixture_a.friction, fixture_b.friction),
            restitution: mix_restitution(fixture_a.restitution, fixture_b.restitution),
            touching: false,
            enabled: true,
            filter_dirty: false,
            in_island: false,
            toi_valid: false,
            toi_count: 0,
            toi: 1.0,
        }
    }

    #[inline]
    pub fn fixture_a(&self) -> FixtureKey {
        self.fixture_a
    }

    #[inline]
    pub fn child_a(&self) -> usize {
        self.child_a
    }

    #[inline]
    pub fn fixture_b(&self) -> FixtureKey {
        self.fixture_b
    }

    #[inline]
    pub fn child_b(&self) -> usize {
        self.child_b
    }

    #[inline]
    pub fn body_a(&self) -> BodyKey {
        self.body_a
    }

    #[inline]
    pub fn body_b(&self) -> BodyKey {
        self.body_b
    }

    #[inline]
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    /// Whether the shapes are actually touching, not just their AABBs.
    #[inline]
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disable the contact for the current step.
    /// Only has an effect from inside [`ContactListener::pre_solve`],
    /// the contact is re-enabled every time it's updated.
    #[inline]
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline]
    pub fn friction(&self) -> f64 {
        self.friction
    }

    /// Override the mixed friction for as long as this contact exists.
    #[inline]
    pub fn set_friction(&mut self, friction: f64) {
        self.friction = friction;
    }

    #[inline]
    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    /// Override the mixed restitution for as long as this contact exists.
    #[inline]
    pub fn set_restitution(&mut self, restitution: f64) {
        self.restitution = restitution;
    }

    /// Compute the new manifold of this contact from the current body poses.
    /// Doesn't modify anything, so this can be done for many contacts in parallel.
    fn evaluate(&self, set: &EntitySet) -> ContactUpdate {
        let fixture_a = set.fixture(self.fixture_a);
        let fixture_b = set.fixture(self.fixture_b);
        let pose_a = set.body(self.body_a).pose;
        let pose_b = set.body(self.body_b).pose;

        if fixture_a.is_sensor || fixture_b.is_sensor {
            // sensors don't create manifolds
            let touching = collision::test_overlap(
                &fixture_a.shape,
                self.child_a,
                &pose_a,
                &fixture_b.shape,
                self.child_b,
                &pose_b,
            );
            ContactUpdate {
                manifold: Manifold::default(),
                touching,
                sensor: true,
            }
        } else {
            let manifold = collision::collide(
                &fixture_a.shape,
                self.child_a,
                &pose_a,
                &fixture_b.shape,
                self.child_b,
                &pose_b,
            );
            ContactUpdate {
                touching: !manifold.is_empty(),
                manifold,
                sensor: false,
            }
        }
    }
}

/// Result of re-running the narrow phase on a contact.
#[derive(Clone, Copy, Debug)]
struct ContactUpdate {
    manifold: Manifold,
    touching: bool,
    sensor: bool,
}

/// Impulses applied by the solver to resolve a contact,
/// reported to [`ContactListener::post_solve`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [f64; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f64; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Callbacks for contact events. All methods do nothing by default.
///
/// The callbacks happen in the middle of a step,
/// so they only get access to the contact in question.
pub trait ContactListener {
    /// Two fixtures started touching.
    fn begin_contact(&mut self, _contact: &Contact) {}

    /// Two fixtures stopped touching.
    /// Also called when a touching contact is destroyed,
    /// e.g. because one of the bodies was destroyed.
    fn end_contact(&mut self, _contact: &Contact) {}

    /// Called after a touching contact is updated and before it's solved.
    /// Disable the contact here to ignore it for the current step,
    /// e.g. to implement one-way platforms.
    fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold) {}

    /// Called after the solver has finished with a contact,
    /// with the impulses it applied.
    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}

/// Decides whether two fixtures should be able to collide.
///
/// The default implementation uses the fixtures' [`Filter`][super::Filter]s.
pub trait ContactFilter {
    fn should_collide(&self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        fixture_a.filter.should_collide(&fixture_b.filter)
    }
}

/// A [`ContactFilter`] using only the fixtures' filters.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultContactFilter;
impl ContactFilter for DefaultContactFilter {}

pub(crate) type Listener = Option<Box<dyn ContactListener + Send>>;

/// Creates contacts for new broad phase pairs, keeps existing ones up to date,
/// and destroys them when they stop overlapping.
pub(crate) struct ContactManager {
    pub broad_phase: BroadPhase<FixtureProxyRef>,
    pub filter: Box<dyn ContactFilter + Send>,
    pub listener: Listener,
}

impl Default for ContactManager {
    fn default() -> Self {
        Self {
            broad_phase: BroadPhase::new(),
            filter: Box::new(DefaultContactFilter),
            listener: None,
        }
    }
}

impl ContactManager {
    /// Create contacts for all new pairs in the broad phase.
    pub fn find_new_contacts(&mut self, set: &mut EntitySet) {
        let filter = &*self.filter;
        self.broad_phase
            .update_pairs(|proxy_a, proxy_b| add_pair(set, filter, proxy_a, proxy_b));
    }

    /// Destroy a contact and remove it from the contact lists of its bodies.
    pub fn destroy(&mut self, set: &mut EntitySet, key: ContactKey) {
        destroy_contact(set, &mut self.listener, key);
    }

    /// Update every contact that has an awake body,
    /// destroying the ones whose fixtures have moved apart.
    pub fn collide(&mut self, set: &mut EntitySet) {
        let _span = tracy_span!("collide contacts", "collide");

        enum Action {
            Skip,
            Destroy,
            Update,
        }

        let keys: Vec<ContactKey> = set.contacts().map(|(key, _)| key).collect();
        let mut to_update = Vec::with_capacity(keys.len());
        for key in keys {
            let action = {
                let contact = set.contact(key);
                let fixture_a = set.fixture(contact.fixture_a);
                let fixture_b = set.fixture(contact.fixture_b);
                let body_a = set.body(contact.body_a);
                let body_b = set.body(contact.body_b);

                let active_a = body_a.awake && body_a.body_type != BodyType::Static;
                let active_b = body_b.awake && body_b.body_type != BodyType::Static;

                if contact.filter_dirty
                    && (!body_b.should_collide(body_a)
                        || !self.filter.should_collide(fixture_a, fixture_b))
                {
                    Action::Destroy
                } else if !active_a && !active_b {
                    // at least one body must be awake and not static
                    Action::Skip
                } else {
                    let proxy_a = fixture_a.proxies[contact.child_a].proxy_id;
                    let proxy_b = fixture_b.proxies[contact.child_b].proxy_id;
                    // fat AABBs have stopped overlapping
                    if !self.broad_phase.test_overlap(proxy_a, proxy_b) {
                        Action::Destroy
                    } else {
                        Action::Update
                    }
                }
            };

            match action {
                Action::Destroy => {
                    destroy_contact(set, &mut self.listener, key);
                    continue;
                }
                Action::Skip => {}
                Action::Update => to_update.push(key),
            }
            set.contact_mut(key).filter_dirty = false;
        }

        #[cfg(feature = "parallel")]
        let updates: Vec<ContactUpdate> = {
            use rayon::prelude::*;
            let set = &*set;
            to_update
                .par_iter()
                .map(|key| set.contact(*key).evaluate(set))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let updates: Vec<ContactUpdate> = to_update
            .iter()
            .map(|key| set.contact(*key).evaluate(set))
            .collect();

        for (key, update) in to_update.into_iter().zip(updates) {
            apply_update(set, &mut self.listener, key, update);
        }
    }

    /// Re-run the narrow phase on a single contact.
    pub fn update(&mut self, set: &mut EntitySet, key: ContactKey) {
        let update = set.contact(key).evaluate(set);
        apply_update(set, &mut self.listener, key, update);
    }
}

fn add_pair(
    set: &mut EntitySet,
    filter: &dyn ContactFilter,
    proxy_a: FixtureProxyRef,
    proxy_b: FixtureProxyRef,
) {
    let fixture_a = set.fixture(proxy_a.fixture);
    let fixture_b = set.fixture(proxy_b.fixture);
    let body_key_a = fixture_a.body;
    let body_key_b = fixture_b.body;

    // fixtures on the same body don't collide
    if body_key_a == body_key_b {
        return;
    }

    let body_a = set.body(body_key_a);
    let body_b = set.body(body_key_b);

    // does a contact already exist?
    let same_pair = |c: &Contact, p1: FixtureProxyRef, p2: FixtureProxyRef| {
        c.fixture_a == p1.fixture
            && c.child_a == p1.child
            && c.fixture_b == p2.fixture
            && c.child_b == p2.child
    };
    let exists = body_b
        .contact_edges
        .iter()
        .filter(|edge| edge.other == body_key_a)
        .any(|edge| {
            let c = set.contact(edge.contact);
            same_pair(c, proxy_a, proxy_b) || same_pair(c, proxy_b, proxy_a)
        });
    if exists {
        return;
    }

    if !body_b.should_collide(body_a) || !filter.should_collide(fixture_a, fixture_b) {
        return;
    }

    // the shape with the higher rank is always the reference shape A
    let (proxy_a, proxy_b) = if shape_rank(&fixture_a.shape) >= shape_rank(&fixture_b.shape) {
        (proxy_a, proxy_b)
    } else {
        (proxy_b, proxy_a)
    };

    let contact = Contact::new(set, proxy_a, proxy_b);
    let (body_key_a, body_key_b) = (contact.body_a, contact.body_b);
    let key = set.insert_contact(contact);

    set.body_mut(body_key_a).contact_edges.push(ContactEdge {
        other: body_key_b,
        contact: key,
    });
    set.body_mut(body_key_b).contact_edges.push(ContactEdge {
        other: body_key_a,
        contact: key,
    });
}

fn destroy_contact(set: &mut EntitySet, listener: &mut Listener, key: ContactKey) {
    let Some(contact) = set.contacts.remove(key.0) else { return };

    if contact.touching {
        if let Some(l) = listener {
            l.end_contact(&contact);
        }
    }

    let is_sensor = |f: FixtureKey| set.get_fixture(f).map_or(false, |f| f.is_sensor);
    let wake = !contact.manifold.is_empty()
        && !is_sensor(contact.fixture_a)
        && !is_sensor(contact.fixture_b);

    for body_key in [contact.body_a, contact.body_b] {
        if let Some(body) = set.get_body_mut(body_key) {
            body.contact_edges.retain(|edge| edge.contact != key);
            if wake {
                body.set_awake(true);
            }
        }
    }
}

fn apply_update(set: &mut EntitySet, listener: &mut Listener, key: ContactKey, update: ContactUpdate) {
    let contact = set.contact_mut(key);
    let old_manifold = contact.manifold;
    let was_touching = contact.touching;

    // re-enable this contact in case it was disabled in pre_solve
    contact.enabled = true;

    let mut manifold = update.manifold;
    if !update.sensor {
        // match old contact ids to new contact ids and copy the
        // stored impulses to warm start the solver
        for new_point in manifold.points_mut() {
            new_point.normal_impulse = 0.0;
            new_point.tangent_impulse = 0.0;
            if let Some(old_point) = old_manifold.points().iter().find(|p| p.id == new_point.id) {
                new_point.normal_impulse = old_point.normal_impulse;
                new_point.tangent_impulse = old_point.tangent_impulse;
            }
        }
    }
    contact.manifold = manifold;
    contact.touching = update.touching;

    if let Some(l) = listener {
        if !was_touching && update.touching {
            l.begin_contact(contact);
        }
        if was_touching && !update.touching {
            l.end_contact(contact);
        }
        if !update.sensor && update.touching {
            l.pre_solve(contact, &old_manifold);
        }
    }

    if !update.sensor && update.touching != was_touching {
        let (body_a, body_b) = (contact.body_a, contact.body_b);
        set.body_mut(body_a).set_awake(true);
        set.body_mut(body_b).set_awake(true);
    }
}

/// Evaluate the manifold of a contact in world space.
pub(crate) fn world_manifold(set: &EntitySet, contact: &Contact) -> WorldManifold {
    let fixture_a = set.fixture(contact.fixture_a);
    let fixture_b = set.fixture(contact.fixture_b);
    WorldManifold::new(
        &contact.manifold,
        &set.body(contact.body_a).pose,
        fixture_a.shape.radius(),
        &set.body(contact.body_b).pose,
        fixture_b.shape.radius(),
    )
}
