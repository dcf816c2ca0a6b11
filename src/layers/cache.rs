//! Per-zone geometry cache and visibility state for the map.
//!
//! Each zone moves through `NotLoaded -> Loading -> Loaded | Failed`. Geometry
//! is fetched at most once per session unless a previous attempt failed, and
//! hiding a zone only detaches its layer. Fetches run on worker threads and
//! report back over a channel; all state and surface mutation happens on the
//! thread that owns the cache, when completions are applied by [`poll`],
//! [`wait_for`] or [`settle`].
//!
//! [`poll`]: ZoneLayerCache::poll
//! [`wait_for`]: ZoneLayerCache::wait_for
//! [`settle`]: ZoneLayerCache::settle

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use tracing::{debug, info, warn};

use super::surface::{LayerHandle, LayerSpec, MarkerSpec, RenderError, RenderSurface};
use crate::api::GeometrySource;
use crate::domain::{ZoneFeature, ZoneFeatures, ZoneId};
use crate::error::ZoneError;
use crate::resolver::ZoneGeometryProvider;

#[derive(Debug, Clone, Default)]
pub enum LayerState {
    #[default]
    NotLoaded,
    Loading,
    Loaded(ZoneFeatures),
    Failed(ZoneError),
}

/// UI feedback for one zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneStatus {
    pub loading: bool,
    pub error: Option<String>,
}

/// Called with the zone and its new status whenever either changes.
pub type StatusListener = Box<dyn FnMut(ZoneId, &ZoneStatus)>;

#[derive(Default)]
struct ZoneEntry {
    state: LayerState,
    /// Most recent visibility request.
    wanted: bool,
    layer: Option<LayerHandle>,
    attached: bool,
    /// A toggle-off hides the last error without making the zone un-retryable.
    error_dismissed: bool,
    /// Geometry that loaded but that the surface refused to draw.
    rejected: Option<ZoneFeatures>,
}

struct FetchCompletion {
    zone: ZoneId,
    result: Result<Vec<ZoneFeature>, ZoneError>,
}

pub struct ZoneLayerCache<S: RenderSurface> {
    entries: [ZoneEntry; ZoneId::COUNT],
    surface: S,
    source: Arc<dyn GeometrySource>,
    completions_tx: Sender<FetchCompletion>,
    completions_rx: Receiver<FetchCompletion>,
    listener: Option<StatusListener>,
}

impl<S: RenderSurface> ZoneLayerCache<S> {
    pub fn new(source: Arc<dyn GeometrySource>, surface: S) -> Self {
        let (completions_tx, completions_rx) = channel();
        Self {
            entries: std::array::from_fn(|_| ZoneEntry::default()),
            surface,
            source,
            completions_tx,
            completions_rx,
            listener: None,
        }
    }

    pub fn with_status_listener(mut self, listener: StatusListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn state(&self, zone: ZoneId) -> &LayerState {
        &self.entries[zone.index()].state
    }

    /// True while the zone's layer is attached to the surface.
    pub fn is_visible(&self, zone: ZoneId) -> bool {
        let entry = &self.entries[zone.index()];
        entry.attached && matches!(entry.state, LayerState::Loaded(_))
    }

    pub fn visible_zones(&self) -> Vec<ZoneId> {
        ZoneId::ALL
            .into_iter()
            .filter(|&zone| self.is_visible(zone))
            .collect()
    }

    pub fn status_of(&self, zone: ZoneId) -> ZoneStatus {
        let entry = &self.entries[zone.index()];
        match &entry.state {
            LayerState::Loading => ZoneStatus {
                loading: true,
                error: None,
            },
            LayerState::Failed(err) if !entry.error_dismissed => ZoneStatus {
                loading: false,
                error: Some(err.to_string()),
            },
            _ => ZoneStatus::default(),
        }
    }

    /// True if any zone has a fetch in flight.
    pub fn is_busy(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.state, LayerState::Loading))
    }

    /// Request a zone be shown or hidden.
    ///
    /// Showing a zone that is not loaded starts a background fetch; the layer
    /// is attached once the completion is applied. Showing a zone that is
    /// already loading does nothing more.
    pub fn set_visible(&mut self, zone: ZoneId, visible: bool) {
        let entry = &mut self.entries[zone.index()];
        entry.wanted = visible;

        if !visible {
            if let Some(handle) = entry.layer
                && entry.attached
            {
                self.surface.detach(handle);
            }
            entry.attached = false;
            entry.error_dismissed = true;
            debug!(zone = %zone, "Zone hidden");
            self.notify(zone);
            return;
        }

        match entry.state {
            LayerState::NotLoaded | LayerState::Failed(_) => self.start_fetch(zone),
            LayerState::Loading => {
                debug!(zone = %zone, "Zone already loading, request coalesced");
            }
            LayerState::Loaded(_) => {
                self.show_loaded(zone);
                self.notify(zone);
            }
        }
    }

    pub fn show_all(&mut self) {
        for zone in ZoneId::ALL {
            self.set_visible(zone, true);
        }
    }

    pub fn hide_all(&mut self) {
        for zone in ZoneId::ALL {
            self.set_visible(zone, false);
        }
    }

    /// Apply any finished fetches without blocking. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let completions: Vec<FetchCompletion> = self.completions_rx.try_iter().collect();
        let applied = completions.len();
        for completion in completions {
            self.apply(completion);
        }
        applied
    }

    /// Block until `zone` is no longer loading, applying completions as they arrive.
    pub fn wait_for(&mut self, zone: ZoneId) {
        while matches!(self.entries[zone.index()].state, LayerState::Loading) {
            match self.completions_rx.recv() {
                Ok(completion) => self.apply(completion),
                Err(_) => break,
            }
        }
    }

    /// Block until no zone is loading.
    pub fn settle(&mut self) {
        while self.is_busy() {
            match self.completions_rx.recv() {
                Ok(completion) => self.apply(completion),
                Err(_) => break,
            }
        }
    }

    fn start_fetch(&mut self, zone: ZoneId) {
        self.mark_loading(zone);

        let source = Arc::clone(&self.source);
        let tx = self.completions_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("zone-fetch-{}", zone))
            .spawn(move || {
                let result = catch_unwind(AssertUnwindSafe(|| source.fetch_zone(zone)))
                    .unwrap_or_else(|_| Err(ZoneError::fetch(zone, "Zone fetch panicked")));
                // Receiver outlives every worker unless the cache was dropped
                let _ = tx.send(FetchCompletion { zone, result });
            });

        if let Err(e) = spawned {
            self.apply(FetchCompletion {
                zone,
                result: Err(ZoneError::fetch(
                    zone,
                    format!("Failed to start fetch: {}", e),
                )),
            });
        }
    }

    fn mark_loading(&mut self, zone: ZoneId) {
        let entry = &mut self.entries[zone.index()];
        entry.state = LayerState::Loading;
        entry.error_dismissed = false;
        entry.rejected = None;
        debug!(zone = %zone, "Loading zone geometry");
        self.notify(zone);
    }

    fn apply(&mut self, completion: FetchCompletion) {
        self.apply_with(completion, true);
    }

    /// Record a finished fetch. The layer is attached only when `attach` is set
    /// and the zone's latest request was to show it.
    fn apply_with(&mut self, completion: FetchCompletion, attach: bool) {
        let FetchCompletion { zone, result } = completion;
        let entry = &mut self.entries[zone.index()];

        if !matches!(entry.state, LayerState::Loading) {
            debug!(zone = %zone, "Ignoring completion for zone that is not loading");
            return;
        }

        match result {
            Ok(features) => {
                info!(zone = %zone, features = features.len(), "Zone geometry loaded");
                entry.state = LayerState::Loaded(Arc::new(features));
                if attach && entry.wanted {
                    self.show_loaded(zone);
                }
            }
            Err(err) => {
                warn!(zone = %zone, error = %err, "Zone geometry fetch failed");
                entry.state = LayerState::Failed(err);
            }
        }

        self.notify(zone);
    }

    /// Attach a loaded zone, building its layer on first use.
    fn show_loaded(&mut self, zone: ZoneId) {
        let entry = &mut self.entries[zone.index()];
        let LayerState::Loaded(features) = &entry.state else {
            return;
        };

        let shown = match entry.layer {
            Some(handle) => self.surface.attach(handle),
            None => self
                .surface
                .add_layer(LayerSpec::for_zone(zone, Arc::clone(features)))
                .map(|handle| entry.layer = Some(handle)),
        };

        match shown {
            Ok(()) => entry.attached = true,
            Err(err) => self.fail_render(zone, err),
        }
    }

    fn fail_render(&mut self, zone: ZoneId, err: RenderError) {
        warn!(zone = %zone, error = %err, "Surface rejected zone layer");
        let entry = &mut self.entries[zone.index()];
        let failed = LayerState::Failed(ZoneError::RenderFailed {
            zone,
            reason: err.to_string(),
        });
        if let LayerState::Loaded(features) = std::mem::replace(&mut entry.state, failed) {
            entry.rejected = Some(features);
        }
        entry.layer = None;
        entry.attached = false;
    }

    /// Pin a marker on the map and center the view on it, replacing any earlier marker.
    pub fn place_marker(&mut self, marker: MarkerSpec) {
        debug!(zone = %marker.zone, at = %marker.coordinate, "Placing marker");
        self.surface.place_marker(marker);
    }

    fn notify(&mut self, zone: ZoneId) {
        let status = self.status_of(zone);
        if let Some(listener) = self.listener.as_mut() {
            listener(zone, &status);
        }
    }
}

impl<S: RenderSurface> ZoneGeometryProvider for ZoneLayerCache<S> {
    /// Cached geometry, or wait on an in-flight fetch, or fetch serially on
    /// this thread. Loading for resolution never attaches a layer, and
    /// geometry the surface refused is still returned.
    fn zone_features(&mut self, zone: ZoneId) -> Result<ZoneFeatures, ZoneError> {
        if let Some(features) = &self.entries[zone.index()].rejected {
            return Ok(Arc::clone(features));
        }
        match &self.entries[zone.index()].state {
            LayerState::Loaded(features) => return Ok(Arc::clone(features)),
            LayerState::Loading => self.wait_for(zone),
            LayerState::NotLoaded | LayerState::Failed(_) => {
                self.mark_loading(zone);
                let result = self.source.fetch_zone(zone);
                self.apply_with(FetchCompletion { zone, result }, false);
            }
        }

        let entry = &self.entries[zone.index()];
        if let Some(features) = &entry.rejected {
            return Ok(Arc::clone(features));
        }
        match &entry.state {
            LayerState::Loaded(features) => Ok(Arc::clone(features)),
            LayerState::Failed(err) => Err(err.clone()),
            LayerState::NotLoaded | LayerState::Loading => Err(ZoneError::fetch(
                zone,
                "Fetch ended without a result",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ZoneGeometry;
    use crate::layers::MapSurface;
    use geo::{LineString, Polygon, coord};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a unit square for every zone and counts fetches per zone.
    #[derive(Default)]
    struct CountingSource {
        calls: [AtomicUsize; ZoneId::COUNT],
        failing: Mutex<HashSet<ZoneId>>,
        degenerate: Mutex<HashSet<ZoneId>>,
    }

    impl CountingSource {
        fn calls(&self, zone: ZoneId) -> usize {
            self.calls[zone.index()].load(Ordering::SeqCst)
        }

        fn set_failing(&self, zone: ZoneId, failing: bool) {
            let mut set = self.failing.lock().unwrap();
            if failing {
                set.insert(zone);
            } else {
                set.remove(&zone);
            }
        }
    }

    impl GeometrySource for CountingSource {
        fn fetch_zone(&self, zone: ZoneId) -> Result<Vec<ZoneFeature>, ZoneError> {
            self.calls[zone.index()].fetch_add(1, Ordering::SeqCst);
            if self.failing.lock().unwrap().contains(&zone) {
                return Err(ZoneError::fetch(zone, "HTTP 503"));
            }
            let ring = if self.degenerate.lock().unwrap().contains(&zone) {
                vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }]
            } else {
                vec![
                    coord! { x: 0.0, y: 0.0 },
                    coord! { x: 0.0, y: 1.0 },
                    coord! { x: 1.0, y: 1.0 },
                    coord! { x: 1.0, y: 0.0 },
                ]
            };
            let polygon = Polygon::new(LineString::new(ring), vec![]);
            Ok(vec![ZoneFeature::new(zone, ZoneGeometry::Polygon(polygon))])
        }
    }

    fn cache() -> (Arc<CountingSource>, ZoneLayerCache<MapSurface>) {
        let source = Arc::new(CountingSource::default());
        let cache = ZoneLayerCache::new(source.clone(), MapSurface::new());
        (source, cache)
    }

    #[test]
    fn test_show_fetches_and_attaches() {
        let (source, mut cache) = cache();
        cache.set_visible(ZoneId::Z6a, true);
        assert_eq!(
            cache.status_of(ZoneId::Z6a),
            ZoneStatus {
                loading: true,
                error: None
            }
        );
        assert!(!cache.is_visible(ZoneId::Z6a));

        cache.settle();
        assert_eq!(source.calls(ZoneId::Z6a), 1);
        assert!(cache.is_visible(ZoneId::Z6a));
        assert_eq!(cache.status_of(ZoneId::Z6a), ZoneStatus::default());
        assert_eq!(cache.surface().attached_zones(), vec![ZoneId::Z6a]);
    }

    #[test]
    fn test_show_twice_fetches_once() {
        let (source, mut cache) = cache();
        cache.set_visible(ZoneId::Z7b, true);
        cache.settle();
        cache.set_visible(ZoneId::Z7b, true);
        cache.settle();
        assert_eq!(source.calls(ZoneId::Z7b), 1);
        assert_eq!(cache.surface().layer_count(), 1);
    }

    #[test]
    fn test_concurrent_toggles_coalesce() {
        let (source, mut cache) = cache();
        cache.set_visible(ZoneId::Z5a, true);
        cache.set_visible(ZoneId::Z5a, true);
        cache.set_visible(ZoneId::Z5a, true);
        cache.settle();
        assert_eq!(source.calls(ZoneId::Z5a), 1);
        assert!(cache.is_visible(ZoneId::Z5a));
    }

    #[test]
    fn test_toggle_round_trip_uses_cache() {
        let (source, mut cache) = cache();
        cache.set_visible(ZoneId::Z8b, true);
        cache.settle();

        cache.set_visible(ZoneId::Z8b, false);
        assert!(!cache.is_visible(ZoneId::Z8b));
        assert!(matches!(cache.state(ZoneId::Z8b), LayerState::Loaded(_)));
        assert!(cache.surface().attached_zones().is_empty());

        cache.set_visible(ZoneId::Z8b, true);
        assert!(!cache.is_busy());
        assert!(cache.is_visible(ZoneId::Z8b));
        assert_eq!(source.calls(ZoneId::Z8b), 1);
        assert_eq!(cache.surface().layer_count(), 1);
    }

    #[test]
    fn test_failure_then_retry() {
        let (source, mut cache) = cache();
        source.set_failing(ZoneId::Z7a, true);

        cache.set_visible(ZoneId::Z7a, true);
        cache.settle();
        let status = cache.status_of(ZoneId::Z7a);
        assert!(!status.loading);
        assert!(status.error.unwrap().contains("HTTP 503"));
        assert!(!cache.is_visible(ZoneId::Z7a));

        source.set_failing(ZoneId::Z7a, false);
        cache.set_visible(ZoneId::Z7a, true);
        cache.settle();
        assert_eq!(cache.status_of(ZoneId::Z7a), ZoneStatus::default());
        assert!(cache.is_visible(ZoneId::Z7a));
        assert_eq!(source.calls(ZoneId::Z7a), 2);
    }

    #[test]
    fn test_hide_clears_error_but_stays_retryable() {
        let (source, mut cache) = cache();
        source.set_failing(ZoneId::Z4a, true);
        cache.set_visible(ZoneId::Z4a, true);
        cache.settle();
        assert!(cache.status_of(ZoneId::Z4a).error.is_some());

        cache.set_visible(ZoneId::Z4a, false);
        assert_eq!(cache.status_of(ZoneId::Z4a), ZoneStatus::default());
        assert!(matches!(cache.state(ZoneId::Z4a), LayerState::Failed(_)));

        source.set_failing(ZoneId::Z4a, false);
        cache.set_visible(ZoneId::Z4a, true);
        cache.settle();
        assert!(cache.is_visible(ZoneId::Z4a));
    }

    #[test]
    fn test_hide_while_loading_caches_without_attaching() {
        let (source, mut cache) = cache();
        cache.set_visible(ZoneId::Z9a, true);
        cache.set_visible(ZoneId::Z9a, false);
        cache.settle();

        assert!(matches!(cache.state(ZoneId::Z9a), LayerState::Loaded(_)));
        assert!(!cache.is_visible(ZoneId::Z9a));
        assert_eq!(cache.surface().layer_count(), 0);

        cache.set_visible(ZoneId::Z9a, true);
        assert!(cache.is_visible(ZoneId::Z9a));
        assert_eq!(source.calls(ZoneId::Z9a), 1);
    }

    #[test]
    fn test_render_failure_is_recoverable() {
        let (source, mut cache) = cache();
        source.degenerate.lock().unwrap().insert(ZoneId::Z11a);

        cache.set_visible(ZoneId::Z11a, true);
        cache.settle();
        assert!(matches!(
            cache.state(ZoneId::Z11a),
            LayerState::Failed(ZoneError::RenderFailed { .. })
        ));
        let error = cache.status_of(ZoneId::Z11a).error.unwrap();
        assert!(error.starts_with("Error adding zone 11a to map"));

        source.degenerate.lock().unwrap().clear();
        cache.set_visible(ZoneId::Z11a, true);
        cache.settle();
        assert!(cache.is_visible(ZoneId::Z11a));
        assert_eq!(source.calls(ZoneId::Z11a), 2);
    }

    #[test]
    fn test_status_listener_sees_transitions() {
        let seen: Rc<RefCell<Vec<(ZoneId, ZoneStatus)>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let source = Arc::new(CountingSource::default());
        let mut cache = ZoneLayerCache::new(source, MapSurface::new()).with_status_listener(
            Box::new(move |zone: ZoneId, status: &ZoneStatus| {
                sink.borrow_mut().push((zone, status.clone()))
            }),
        );

        cache.set_visible(ZoneId::Z3b, true);
        cache.settle();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].1.loading);
        assert_eq!(seen[1], (ZoneId::Z3b, ZoneStatus::default()));
    }

    #[test]
    fn test_show_all_and_hide_all() {
        let (source, mut cache) = cache();
        source.set_failing(ZoneId::Z12a, true);

        cache.show_all();
        cache.settle();
        assert_eq!(cache.visible_zones().len(), ZoneId::COUNT - 1);
        assert!(cache.status_of(ZoneId::Z12a).error.is_some());

        cache.hide_all();
        assert!(cache.visible_zones().is_empty());
        assert!(cache.surface().attached_zones().is_empty());
        assert_eq!(cache.poll(), 0);
    }

    #[test]
    fn test_provider_loads_without_showing() {
        let (source, mut cache) = cache();
        let features = cache.zone_features(ZoneId::Z10a).unwrap();
        assert_eq!(features.len(), 1);
        assert!(!cache.is_visible(ZoneId::Z10a));

        cache.zone_features(ZoneId::Z10a).unwrap();
        cache.set_visible(ZoneId::Z10a, true);
        assert!(cache.is_visible(ZoneId::Z10a));
        assert_eq!(source.calls(ZoneId::Z10a), 1);
    }

    #[test]
    fn test_provider_waits_for_in_flight_fetch() {
        let (source, mut cache) = cache();
        cache.set_visible(ZoneId::Z6b, true);
        cache.zone_features(ZoneId::Z6b).unwrap();
        assert_eq!(source.calls(ZoneId::Z6b), 1);
        assert!(cache.is_visible(ZoneId::Z6b));
    }

    #[test]
    fn test_provider_records_failure() {
        let (source, mut cache) = cache();
        source.set_failing(ZoneId::Z8a, true);
        assert!(cache.zone_features(ZoneId::Z8a).is_err());
        assert!(cache.status_of(ZoneId::Z8a).error.is_some());
    }

    struct PanickingSource;

    impl GeometrySource for PanickingSource {
        fn fetch_zone(&self, zone: ZoneId) -> Result<Vec<ZoneFeature>, ZoneError> {
            panic!("decoder blew up on zone {}", zone);
        }
    }

    #[test]
    fn test_worker_panic_becomes_fetch_failure() {
        let mut cache = ZoneLayerCache::new(Arc::new(PanickingSource), MapSurface::new());
        cache.set_visible(ZoneId::Z5b, true);
        cache.settle();

        assert!(matches!(
            cache.state(ZoneId::Z5b),
            LayerState::Failed(ZoneError::FetchFailed { .. })
        ));
        assert!(cache.status_of(ZoneId::Z5b).error.unwrap().contains("panicked"));
        assert!(!cache.is_busy());
    }

    #[test]
    fn test_provider_returns_geometry_surface_rejected() {
        let (source, mut cache) = cache();
        source.degenerate.lock().unwrap().insert(ZoneId::Z9b);
        cache.set_visible(ZoneId::Z9b, true);
        cache.settle();

        let features = cache.zone_features(ZoneId::Z9b).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(source.calls(ZoneId::Z9b), 1);
        assert!(cache.status_of(ZoneId::Z9b).error.is_some());
    }

    #[test]
    fn test_place_marker_goes_to_surface() {
        let (_, mut cache) = cache();
        let at = crate::domain::Coordinate::new(40.7, -74.0).unwrap();
        cache.place_marker(MarkerSpec::for_zone(at, ZoneId::Z7b, "New York"));
        assert_eq!(cache.surface().marker().unwrap().zone, ZoneId::Z7b);
        assert_eq!(cache.surface().view().unwrap().zoom, 8);
    }
}
