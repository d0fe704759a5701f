//! Integration Tests for the Reactive Runtime
//!
//! These tests drive signals, memos, effects, async signals and scope
//! containers together through the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cascade_core::container::{cleanup, use_context, use_unit, ScopeContainer, Unit};
use cascade_core::error::{ContainerError, UnitError, UnwrapError};
use cascade_core::reactive::{
    derived, effect, AsyncSignal, Effect, FutureState, Memo, ScopeKind, Signal, TrackingScope,
};
use tokio::sync::oneshot;

/// A component-like render scope that re-runs `render` whenever something it
/// read changes, the way a UI binding would drive it.
struct Component {
    scope: TrackingScope,
    renders: Rc<Cell<usize>>,
}

impl Component {
    fn mount(render: impl Fn() + 'static) -> Self {
        let scope = TrackingScope::new(ScopeKind::Component);
        let renders = Rc::new(Cell::new(0));
        let render: Rc<dyn Fn()> = Rc::new(render);
        Self::pass(&scope, &renders, &render);
        Self { scope, renders }
    }

    fn pass(scope: &TrackingScope, renders: &Rc<Cell<usize>>, render: &Rc<dyn Fn()>) {
        scope.track(|| render());
        renders.set(renders.get() + 1);

        let (next_scope, next_renders, next_render) = (scope.clone(), renders.clone(), render.clone());
        // The subscription stays installed on the scope; dropping the handle
        // does not detach it.
        let _ = scope.subscribe(move || Self::pass(&next_scope, &next_renders, &next_render));
    }
}

/// Writing distinct values notifies once per write.
#[test]
fn distinct_writes_notify_once_each() {
    let count = Signal::new(0);
    let source = count.clone();
    let component = Component::mount(move || {
        source.get();
    });

    for next in 1..=3 {
        count.set(next);
    }

    assert_eq!(component.renders.get(), 4);
    assert_eq!(count.get(), 3);
}

/// Writing an equal value notifies nobody.
#[test]
fn equal_write_is_silent() {
    let name = Signal::new("cascade".to_string());
    let source = name.clone();
    let component = Component::mount(move || {
        source.with(|_| ());
    });

    assert!(!name.set("cascade".to_string()));
    assert_eq!(component.renders.get(), 1);
    assert!(component.scope.is_subscribed());
}

/// A memo invalidated many times recomputes once, on the next read.
#[test]
fn memo_recomputes_lazily_after_many_changes() {
    let calls = Rc::new(Cell::new(0));
    let count = Signal::new(1);

    let (source, counter) = (count.clone(), calls.clone());
    let doubled = Memo::new(move || {
        counter.set(counter.get() + 1);
        source.get() * 2
    });

    assert_eq!(doubled.get(), 2);
    for next in 2..=10 {
        count.set(next);
    }
    assert_eq!(calls.get(), 1);

    assert_eq!(doubled.get(), 20);
    assert_eq!(doubled.get(), 20);
    assert_eq!(calls.get(), 2);
}

/// Memos chain, and a component reading the outer memo re-renders once per
/// upstream write.
#[test]
fn chained_memos_drive_component() {
    let base = Signal::new(1);

    let source = base.clone();
    let doubled = Memo::new(move || source.get() * 2);
    let inner = doubled.clone();
    let quadrupled = Memo::new(move || inner.get() * 2);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let (outer, sink) = (quadrupled.clone(), seen.clone());
    let component = Component::mount(move || sink.borrow_mut().push(outer.get()));

    base.set(2);
    base.set(3);

    assert_eq!(*seen.borrow(), vec![4, 8, 12]);
    assert_eq!(component.renders.get(), 3);
}

/// An effect that reads and then writes the same signal runs once and does
/// not depend on that signal afterwards.
#[test]
fn self_writing_effect_never_recurses() {
    let count = Signal::new(0);
    let source = count.clone();
    let effect = Effect::new(move || {
        let value = source.get();
        source.set(value + 1);
    });

    assert_eq!(effect.run_count(), 1);
    assert_eq!(count.get_untracked(), 1);
    assert_eq!(effect.dependency_count(), 0);

    count.set(10);
    assert_eq!(effect.run_count(), 1);
    assert_eq!(count.get_untracked(), 10);

    effect.dispose();
}

/// Effects pick up a new dependency set on every run.
#[test]
fn effect_follows_conditional_dependencies() {
    let use_left = Signal::new(true);
    let left = Signal::new("left");
    let right = Signal::new("right");
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (flag, l, r, sink) = (use_left.clone(), left.clone(), right.clone(), seen.clone());
    let effect = Effect::new(move || {
        let value = if flag.get() { l.get() } else { r.get() };
        sink.borrow_mut().push(value);
    });

    right.set("ignored");
    use_left.set(false);
    left.set("ignored too");
    right.set("right again");

    assert_eq!(*seen.borrow(), vec!["left", "ignored", "right again"]);
    effect.dispose();
}

/// A component reading a signal and a memo over that signal renders once per
/// write, and never sees the memo lag behind the signal.
#[test]
fn signal_and_memo_diamond_renders_once_per_write() {
    let count = Signal::new(1);
    let source = count.clone();
    let doubled = Memo::new(move || source.get() * 2);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let (c, d, sink) = (count.clone(), doubled.clone(), seen.clone());
    let component = Component::mount(move || sink.borrow_mut().push((c.get(), d.get())));

    count.set(2);
    count.set(3);

    assert_eq!(*seen.borrow(), vec![(1, 2), (2, 4), (3, 6)]);
    assert_eq!(component.renders.get(), 3);
}

/// Two memos over one signal, joined by a third: an effect on the join runs
/// once per write and only ever sees consistent totals.
#[test]
fn memo_diamond_runs_effect_once_per_write() {
    let base = Signal::new(1);

    let source = base.clone();
    let plus_one = Memo::new(move || source.get() + 1);
    let source = base.clone();
    let doubled = Memo::new(move || source.get() * 2);
    let (left, right) = (plus_one.clone(), doubled.clone());
    let joined = Memo::new(move || left.get() + right.get());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let (memo, sink) = (joined.clone(), seen.clone());
    let effect = Effect::new(move || sink.borrow_mut().push(memo.get()));

    base.set(2);
    base.set(10);

    // (n + 1) + 2n for n = 1, 2, 10
    assert_eq!(*seen.borrow(), vec![4, 7, 31]);
    assert_eq!(effect.run_count(), 3);
    assert_eq!(joined.computations(), 3);
    assert_eq!(doubled.computations(), 3);
    assert_eq!(base.observer_count(), 2);

    effect.dispose();
}

/// Only the settlement of the latest write is ever observed.
#[tokio::test]
async fn superseded_async_write_is_never_observed() {
    let user = AsyncSignal::<&'static str, String>::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (source, sink) = (user.clone(), seen.clone());
    let effect = Effect::new(move || sink.borrow_mut().push(source.read()));

    let (tx_a, rx_a) = oneshot::channel::<Result<&'static str, String>>();
    let (tx_b, rx_b) = oneshot::channel::<Result<&'static str, String>>();
    let settle_a = user.write(async move { rx_a.await.unwrap_or(Err("dropped".into())) });
    let settle_b = user.write(async move { rx_b.await.unwrap_or(Err("dropped".into())) });

    tx_a.send(Ok("alice")).unwrap();
    assert!(!settle_a.await);
    tx_b.send(Ok("bob")).unwrap();
    assert!(settle_b.await);

    assert_eq!(user.read().unwrap(), Ok("bob"));
    assert!(!seen
        .borrow()
        .iter()
        .any(|state| *state == FutureState::Fulfilled("alice")));
    assert_eq!(seen.borrow().last(), Some(&FutureState::Fulfilled("bob")));

    effect.dispose();
}

#[tokio::test]
async fn pending_state_unwraps_to_pending() {
    let data = AsyncSignal::<u32, String>::new();
    assert_eq!(data.read().unwrap(), Err(UnwrapError::Pending));

    let settlement = data.write(async { Err::<u32, _>("offline".to_string()) });
    assert!(data.read().is_pending());
    assert!(settlement.await);
    assert_eq!(
        data.read().unwrap(),
        Err(UnwrapError::Rejected("offline".to_string()))
    );
}

#[derive(Debug)]
struct Counter {
    count: Signal<i32>,
}

impl Counter {
    fn inc(&self) {
        self.count.update(|n| n + 1);
    }

    fn get(&self) -> i32 {
        self.count.get()
    }
}

/// Constructs once per container and shares the instance.
#[test]
fn unit_resolves_to_same_instance() {
    let constructions = Rc::new(Cell::new(0));
    let root = ScopeContainer::root();

    let counter = constructions.clone();
    root.provide_with::<Counter, _>(move || {
        counter.set(counter.get() + 1);
        Ok(Counter {
            count: Signal::new(0),
        })
    });

    let first = root.resolve::<Counter>().unwrap();
    let second = root.resolve::<Counter>().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(constructions.get(), 1);
}

/// A failed construction is reported again on every later resolve.
#[test]
fn construction_failure_is_sticky() {
    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded")]
    struct Quota;

    let attempts = Rc::new(Cell::new(0));
    let root = ScopeContainer::root();

    let counter = attempts.clone();
    root.provide_with::<Counter, _>(move || {
        counter.set(counter.get() + 1);
        Err(Box::new(Quota) as UnitError)
    });

    let errors: Vec<ContainerError> = (0..3)
        .map(|_| root.resolve::<Counter>().unwrap_err())
        .collect();

    assert_eq!(attempts.get(), 1);
    for err in &errors[1..] {
        assert!(std::sync::Arc::ptr_eq(
            err.construction_source().unwrap(),
            errors[0].construction_source().unwrap()
        ));
    }
}

/// A child without its own entry shares the parent's instance and leaves it
/// alive when disposed.
#[test]
fn child_container_inherits_and_disposes_independently() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let root = ScopeContainer::root();

    let sink = log.clone();
    root.provide_with::<Counter, _>(move || {
        let sink = sink.clone();
        cleanup(move || sink.borrow_mut().push("root counter"))?;
        Ok(Counter {
            count: Signal::new(0),
        })
    });

    let child = root.child();
    let shared = child.resolve::<Counter>().unwrap();
    shared.inc();
    child.dispose();

    assert!(log.borrow().is_empty());
    assert_eq!(root.resolve::<Counter>().unwrap().get(), 1);

    root.dispose();
    root.dispose();
    assert_eq!(*log.borrow(), vec!["root counter"]);
}

/// Counter scenario: increment twice, read two, dispose runs the cleanup.
#[test]
fn counter_scenario() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let container = ScopeContainer::root();

    let sink = log.clone();
    container.provide_with::<Counter, _>(move || {
        let sink = sink.clone();
        cleanup(move || sink.borrow_mut().push("cleanup"))?;
        Ok(Counter {
            count: Signal::new(0),
        })
    });

    let c1 = container.resolve::<Counter>().unwrap();
    c1.inc();
    c1.inc();
    assert_eq!(c1.get(), 2);

    container.dispose();
    assert_eq!(*log.borrow(), vec!["cleanup"]);
}

struct Cart {
    items: Signal<Vec<u32>>,
    total: Memo<u32>,
    audit: Rc<RefCell<Vec<u32>>>,
    _audit_effect: Effect,
}

impl Unit for Cart {
    fn construct() -> Result<Self, UnitError> {
        let items: Signal<Vec<u32>> = Signal::new(Vec::new());

        let source = items.clone();
        let total: Memo<u32> = derived(move || source.with(|items: &Vec<u32>| items.iter().sum()))?;

        let audit: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        let (watched, sink) = (total.clone(), audit.clone());
        let audit_effect = effect(move || sink.borrow_mut().push(watched.get()))?;

        Ok(Cart {
            items,
            total,
            audit,
            _audit_effect: audit_effect,
        })
    }
}

struct Checkout {
    cart: Rc<Cart>,
}

impl Unit for Checkout {
    fn construct() -> Result<Self, UnitError> {
        Ok(Checkout {
            cart: use_unit::<Cart>()?,
        })
    }
}

/// Units build on each other, and disposal stops their memos and effects.
#[test]
fn units_compose_and_dispose_reactive_state() {
    let root = ScopeContainer::root();
    root.provide::<Cart>();
    let page = root.child();
    page.provide::<Checkout>();

    let checkout = page.resolve::<Checkout>().unwrap();
    let cart = root.resolve::<Cart>().unwrap();
    assert!(Rc::ptr_eq(&checkout.cart, &cart));

    cart.items.set(vec![3, 4]);
    assert_eq!(cart.total.get(), 7);
    assert_eq!(*cart.audit.borrow(), vec![0, 7]);

    page.dispose();
    cart.items.set(vec![1]);
    assert_eq!(*cart.audit.borrow(), vec![0, 7, 1]);

    root.dispose();
    cart.items.set(vec![5, 5]);
    assert_eq!(*cart.audit.borrow(), vec![0, 7, 1]);
    assert!(cart.total.is_disposed());
}

/// A unit built from host props and an ancestor's context follows prop
/// changes in place.
#[test]
fn unit_follows_props_and_reads_context() {
    struct Currency(&'static str);

    struct PriceTag {
        label: Memo<String>,
    }

    let app = ScopeContainer::root();
    app.provide_context(Currency("EUR"));
    let row = app.child();
    let price = row.provide_with_props::<PriceTag, _, _>(10_u32, |price| {
        let currency = use_context::<Currency>()?;
        let label = derived(move || format!("{} {}", price.get(), currency.0))?;
        Ok(PriceTag { label })
    });

    let tag = row.resolve::<PriceTag>().unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (label, sink) = (tag.label.clone(), seen.clone());
    let component = Component::mount(move || sink.borrow_mut().push(label.get()));

    price.set(12);
    assert_eq!(*seen.borrow(), vec!["10 EUR", "12 EUR"]);
    assert_eq!(component.renders.get(), 2);

    row.dispose();
    assert!(tag.label.is_disposed());
}

/// Reactive helpers that need an owner fail loudly without one.
#[test]
fn owner_bound_helpers_require_resolution() {
    assert!(matches!(
        derived(|| 1),
        Err(ContainerError::OutsideResolution { .. })
    ));
    assert!(matches!(
        effect(|| {}),
        Err(ContainerError::OutsideResolution { .. })
    ));
    assert!(matches!(
        cleanup(|| {}),
        Err(ContainerError::OutsideResolution { .. })
    ));
}
