//! Route-level permission resolution.
//!
//! The resolver answers "may this identity open this path?" over one
//! [`PermissionSnapshot`]. It never fails: missing data degrades to allow
//! (while loading, for unknown modules and for unknown pages). The only way
//! to be denied is an explicit or defaulted `can_view = false` on a module or
//! page that the catalog knows about.

use percent_encoding::percent_decode_str;
use serde::Serialize;

use super::aliases::SlugAliases;
use super::snapshot::PermissionSnapshot;
use crate::models::{Identity, ModulePermission, PagePermission};

/// What a path resolved to in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMatch<'a> {
    /// `/`, always open.
    Root,
    /// First segment is not a module the catalog knows.
    Unmanaged,
    /// Module root, e.g. `/catalogue`.
    Module(&'a ModulePermission),
    /// Page of a known module, e.g. `/catalogue/all`.
    Page(&'a ModulePermission, &'a PagePermission),
    /// Second segment under a known module that matches no page.
    UnknownPage(&'a ModulePermission),
}

/// Why a route was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    SuperAdmin,
    /// Identity or permission data not available yet.
    Pending,
    /// Root, unknown module or unknown page.
    Unmanaged,
    Granted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed(AllowReason),
    Denied {
        module: ModulePermission,
        page: Option<PagePermission>,
    },
}

impl AllowReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllowReason::SuperAdmin => "super_admin",
            AllowReason::Pending => "pending",
            AllowReason::Unmanaged => "unmanaged",
            AllowReason::Granted => "granted",
        }
    }
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed(_))
    }
}

pub struct PermissionResolver<'a> {
    identity: &'a Identity,
    snapshot: &'a PermissionSnapshot,
    aliases: &'a SlugAliases,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(
        identity: &'a Identity,
        snapshot: &'a PermissionSnapshot,
        aliases: &'a SlugAliases,
    ) -> Self {
        Self {
            identity,
            snapshot,
            aliases,
        }
    }

    /// True while identity or any of the three inputs is unavailable.
    ///
    /// A failed fetch counts as unavailable, so failures fail open exactly
    /// like an in-flight request does.
    pub fn is_loading(&self) -> bool {
        self.identity.email.is_none() || self.snapshot.is_pending()
    }

    /// Route check without the super-admin override; see [`Self::decide`].
    pub fn can_access_route(&self, path: &str) -> bool {
        if self.is_loading() {
            return true;
        }

        match self.match_route(path) {
            None | Some(RouteMatch::Root) | Some(RouteMatch::Unmanaged) => true,
            Some(RouteMatch::Module(module)) | Some(RouteMatch::UnknownPage(module)) => {
                module.can_view
            }
            Some(RouteMatch::Page(module, page)) => module.can_view && page.can_view,
        }
    }

    /// Route check as every consumer must apply it: super-admins first, then
    /// [`Self::can_access_route`], with the reason kept for logs and metrics.
    pub fn decide(&self, path: &str) -> AccessDecision {
        if self.identity.is_super_admin {
            return AccessDecision::Allowed(AllowReason::SuperAdmin);
        }
        if self.is_loading() {
            return AccessDecision::Allowed(AllowReason::Pending);
        }

        match self.match_route(path) {
            None => AccessDecision::Allowed(AllowReason::Pending),
            Some(RouteMatch::Root) | Some(RouteMatch::Unmanaged) => {
                AccessDecision::Allowed(AllowReason::Unmanaged)
            }
            Some(RouteMatch::Module(module)) | Some(RouteMatch::UnknownPage(module))
                if !module.can_view =>
            {
                AccessDecision::Denied {
                    module: module.clone(),
                    page: None,
                }
            }
            Some(RouteMatch::Page(module, _)) if !module.can_view => AccessDecision::Denied {
                module: module.clone(),
                page: None,
            },
            Some(RouteMatch::Page(module, page)) if !page.can_view => AccessDecision::Denied {
                module: module.clone(),
                page: Some(page.clone()),
            },
            Some(RouteMatch::UnknownPage(_)) => AccessDecision::Allowed(AllowReason::Unmanaged),
            Some(RouteMatch::Module(_)) | Some(RouteMatch::Page(..)) => {
                AccessDecision::Allowed(AllowReason::Granted)
            }
        }
    }

    pub fn can_access_module(&self, module_id: i64) -> bool {
        if self.is_loading() {
            return true;
        }
        self.snapshot
            .derived()
            .module_by_id(module_id)
            .map(|m| m.can_view)
            .unwrap_or(false)
    }

    pub fn can_access_page(&self, page_id: i64) -> bool {
        if self.is_loading() {
            return true;
        }
        self.snapshot
            .derived()
            .page_by_id(page_id)
            .map(|p| p.can_view)
            .unwrap_or(false)
    }

    /// The module a path falls under, if the catalog knows it.
    pub fn module_for_route(&self, path: &str) -> Option<&'a ModulePermission> {
        match self.match_route(path)? {
            RouteMatch::Module(module)
            | RouteMatch::UnknownPage(module)
            | RouteMatch::Page(module, _) => Some(module),
            RouteMatch::Root | RouteMatch::Unmanaged => None,
        }
    }

    /// The page a path points at, if the catalog knows it.
    pub fn page_for_route(&self, path: &str) -> Option<&'a PagePermission> {
        match self.match_route(path)? {
            RouteMatch::Page(_, page) => Some(page),
            _ => None,
        }
    }

    /// Modules to show in navigation menus.
    pub fn visible_modules(&self) -> Vec<&'a ModulePermission> {
        let modules = &self.snapshot.derived().modules;
        if self.identity.is_super_admin || self.is_loading() {
            return modules.iter().collect();
        }
        modules.iter().filter(|m| m.can_view).collect()
    }

    /// Resolve a path against the catalog; `None` until both catalogs loaded.
    pub fn match_route(&self, path: &str) -> Option<RouteMatch<'a>> {
        if !self.snapshot.catalogs_ready() {
            return None;
        }

        let derived = self.snapshot.derived();
        let (module_code, page_slug) = split_route(path);

        if module_code.is_empty() {
            return Some(RouteMatch::Root);
        }

        let Some(module) = derived.module_by_code(&module_code) else {
            return Some(RouteMatch::Unmanaged);
        };

        let Some(page_slug) = page_slug else {
            return Some(RouteMatch::Module(module));
        };

        let candidates = self.aliases.candidates(&page_slug);
        let page = derived.pages_of(module.module_id).find(|page| {
            candidates
                .iter()
                .any(|c| *c == page.slug || c.eq_ignore_ascii_case(&page.page_code))
        });

        Some(match page {
            Some(page) => RouteMatch::Page(module, page),
            None => RouteMatch::UnknownPage(module),
        })
    }
}

/// Split a path into its first two segments, percent-decoded and lower-cased.
///
/// Query strings and fragments are ignored; an empty second segment
/// (`/news/`) counts as absent. Segments are decoded the way the browser
/// router sees them, so `/%6Eews` is `/news`.
pub fn split_route(path: &str) -> (String, Option<String>) {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.trim_start_matches('/').split('/');

    let first = decode_segment(segments.next().unwrap_or_default());
    let second = segments
        .next()
        .map(decode_segment)
        .filter(|s| !s.is_empty());

    (first, second)
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment)
        .decode_utf8_lossy()
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, Module, Page, ViewMatrix, ViewMatrixEntry};
    use crate::models::identity::SuperAdmins;
    use crate::permissions::snapshot::Fetch;
    use std::sync::Arc;

    fn module(id: i64, code: &str, name: &str) -> Module {
        Module {
            module_id: id,
            module_code: code.to_string(),
            module_name: name.to_string(),
        }
    }

    fn page(id: i64, code: &str, module_id: i64) -> Page {
        Page {
            page_id: id,
            page_code: code.to_string(),
            page_name: code.to_string(),
            module_id,
        }
    }

    fn rule(entity_type: EntityType, target: i64, can_view: bool) -> ViewMatrixEntry {
        ViewMatrixEntry {
            entity_type,
            target,
            can_view,
        }
    }

    fn snapshot(modules: Vec<Module>, pages: Vec<Page>, matrix: ViewMatrix) -> PermissionSnapshot {
        PermissionSnapshot::new(
            Fetch::Ready(Arc::new(modules)),
            Fetch::Ready(Arc::new(pages)),
            Fetch::Ready(Arc::new(matrix)),
        )
    }

    /// catalogue (allowed) with offices (denied) and catalogue_all (allowed);
    /// news (denied) with a page that is allowed.
    fn portal() -> PermissionSnapshot {
        snapshot(
            vec![
                module(1, "catalogue", "Catalogue"),
                module(2, "News", "News"),
                module(3, "Job Offers", "Job offers"),
            ],
            vec![
                page(10, "offices", 1),
                page(11, "catalogue_all", 1),
                page(20, "Latest", 2),
            ],
            ViewMatrix {
                modules: vec![
                    rule(EntityType::Module, 1, true),
                    rule(EntityType::Module, 2, false),
                    rule(EntityType::Module, 3, true),
                ],
                pages: vec![
                    rule(EntityType::Page, 10, false),
                    rule(EntityType::Page, 11, true),
                    rule(EntityType::Page, 20, true),
                ],
            },
        )
    }

    fn user() -> Identity {
        Identity::new("jane@corp.example", &SuperAdmins::default())
    }

    #[test]
    fn test_split_route() {
        assert_eq!(split_route("/"), (String::new(), None));
        assert_eq!(split_route(""), (String::new(), None));
        assert_eq!(split_route("/News"), ("news".into(), None));
        assert_eq!(split_route("/news/"), ("news".into(), None));
        assert_eq!(
            split_route("catalogue/All/extra?x=1"),
            ("catalogue".into(), Some("all".into()))
        );
        assert_eq!(split_route("/jobs#top"), ("jobs".into(), None));
    }

    #[test]
    fn test_split_route_decodes_segments() {
        assert_eq!(split_route("/%6Eews"), ("news".into(), None));
        assert_eq!(
            split_route("/catalogue/%6Fffices"),
            ("catalogue".into(), Some("offices".into()))
        );
        assert_eq!(
            split_route("/Job%20Offers/%4C%41TEST"),
            ("job offers".into(), Some("latest".into()))
        );
        assert_eq!(split_route("/news/%20"), ("news".into(), None));
    }

    #[test]
    fn test_encoded_paths_are_denied_like_plain_ones() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert!(!resolver.can_access_route("/%6Eews"));
        assert!(!resolver.can_access_route("/catalogue/%6Fffices"));
        assert!(!resolver.can_access_route("/catalogue/%6f%66%66ices"));
        assert!(resolver.can_access_route("/catalogue/%61ll"));
    }

    #[test]
    fn test_repeated_queries_give_the_same_answer() {
        let snapshot = portal();
        let derived_before = snapshot.derived().clone();
        let identity = user();
        let aliases = SlugAliases::default();
        let paths = [
            "/",
            "/catalogue",
            "/catalogue/offices",
            "/catalogue/all",
            "/all",
            "/news",
            "/news/latest",
            "/job-offers",
            "/unknown/page",
        ];

        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);
        let first: Vec<_> = paths
            .iter()
            .map(|p| (resolver.can_access_route(p), resolver.decide(p)))
            .collect();

        for _ in 0..3 {
            let again = PermissionResolver::new(&identity, &snapshot, &aliases);
            let answers: Vec<_> = paths
                .iter()
                .map(|p| (again.can_access_route(p), again.decide(p)))
                .collect();
            assert_eq!(answers, first);
        }

        assert_eq!(snapshot.derived(), &derived_before);
    }

    #[test]
    fn test_root_is_always_allowed() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert!(resolver.can_access_route("/"));
        assert!(resolver.can_access_route(""));
        assert_eq!(resolver.decide("/"), AccessDecision::Allowed(AllowReason::Unmanaged));
    }

    #[test]
    fn test_offices_page_denied_but_module_allowed() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert!(!resolver.can_access_route("/catalogue/offices"));
        assert!(resolver.can_access_route("/catalogue"));
        assert!(resolver.can_access_route("/Catalogue/"));
    }

    #[test]
    fn test_alias_resolves_all_to_catalogue_all() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert!(resolver.can_access_route("/catalogue/all"));
        assert_eq!(resolver.page_for_route("/catalogue/all").unwrap().page_id, 11);

        // Without the alias the slug matches nothing and fails open
        let no_aliases = SlugAliases::new();
        let plain = PermissionResolver::new(&identity, &snapshot, &no_aliases);
        assert!(plain.page_for_route("/catalogue/all").is_none());
        assert!(plain.can_access_route("/catalogue/all"));
    }

    #[test]
    fn test_module_denial_short_circuits_page_allowance() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert!(!resolver.can_access_route("/news"));
        assert!(!resolver.can_access_route("/news/latest"));
        assert!(!resolver.can_access_route("/news/not-a-page"));

        match resolver.decide("/news/latest") {
            AccessDecision::Denied { module, page } => {
                assert_eq!(module.module_id, 2);
                assert!(page.is_none());
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_module_and_unknown_page_fail_open() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert!(resolver.can_access_route("/directory"));
        assert!(resolver.can_access_route("/directory/anything"));
        assert!(resolver.can_access_route("/catalogue/unregistered"));
        assert_eq!(
            resolver.decide("/catalogue/unregistered"),
            AccessDecision::Allowed(AllowReason::Unmanaged)
        );
    }

    #[test]
    fn test_module_codes_with_spaces_match_hyphenated_segments() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert_eq!(resolver.module_for_route("/job-offers").unwrap().module_id, 3);
        assert_eq!(
            resolver.decide("/job-offers"),
            AccessDecision::Allowed(AllowReason::Granted)
        );
    }

    #[test]
    fn test_page_denial_reports_page() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        match resolver.decide("/catalogue/offices") {
            AccessDecision::Denied { module, page } => {
                assert_eq!(module.module_name, "Catalogue");
                assert_eq!(page.unwrap().page_id, 10);
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[test]
    fn test_super_admin_overrides_denials_in_decide_only() {
        let snapshot = portal();
        let identity = Identity::new("root@corp.example", &SuperAdmins::new(["root@corp.example"]));
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert_eq!(
            resolver.decide("/news"),
            AccessDecision::Allowed(AllowReason::SuperAdmin)
        );
        assert!(!resolver.can_access_route("/news"));
        assert_eq!(resolver.visible_modules().len(), 3);
    }

    #[test]
    fn test_everything_allowed_while_loading() {
        let identity = user();
        let aliases = SlugAliases::default();

        let loading = PermissionSnapshot::loading();
        let resolver = PermissionResolver::new(&identity, &loading, &aliases);
        assert!(resolver.is_loading());
        for path in ["/", "/news", "/news/latest", "/catalogue/offices"] {
            assert!(resolver.can_access_route(path));
            assert_eq!(resolver.decide(path), AccessDecision::Allowed(AllowReason::Pending));
        }
        assert!(resolver.can_access_module(2));
        assert!(resolver.can_access_page(10));

        // Catalog ready, matrix still in flight
        let ready = portal();
        let partial = PermissionSnapshot::new(ready.modules.clone(), ready.pages.clone(), Fetch::Loading);
        let resolver = PermissionResolver::new(&identity, &partial, &aliases);
        assert!(resolver.can_access_route("/news"));
        // Matching still works for messaging
        assert_eq!(resolver.module_for_route("/news").unwrap().module_name, "News");
    }

    #[test]
    fn test_anonymous_identity_is_never_blocked() {
        let snapshot = portal();
        let identity = Identity::anonymous();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert!(resolver.can_access_route("/news"));
        assert!(resolver.can_access_route("/catalogue/offices"));
    }

    #[test]
    fn test_failed_matrix_fails_open() {
        let ready = portal();
        let failed = PermissionSnapshot::new(
            ready.modules.clone(),
            ready.pages.clone(),
            Fetch::Failed("timeout".into()),
        );
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &failed, &aliases);

        assert!(resolver.can_access_route("/catalogue/offices"));
        assert_eq!(
            resolver.decide("/news"),
            AccessDecision::Allowed(AllowReason::Pending)
        );
    }

    #[test]
    fn test_id_lookups_default_to_denied_once_loaded() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert!(resolver.can_access_module(1));
        assert!(!resolver.can_access_module(2));
        assert!(!resolver.can_access_module(404));
        assert!(resolver.can_access_page(11));
        assert!(!resolver.can_access_page(10));
        assert!(!resolver.can_access_page(404));
    }

    #[test]
    fn test_visible_modules_filters_denied() {
        let snapshot = portal();
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        let codes: Vec<&str> = resolver
            .visible_modules()
            .iter()
            .map(|m| m.module_code.as_str())
            .collect();
        assert_eq!(codes, vec!["catalogue", "job-offers"]);
    }

    #[test]
    fn test_page_of_other_module_does_not_match() {
        let snapshot = snapshot(
            vec![module(1, "catalogue", "Catalogue"), module(2, "news", "News")],
            vec![page(20, "offices", 2)],
            ViewMatrix {
                modules: vec![rule(EntityType::Module, 1, true), rule(EntityType::Module, 2, true)],
                pages: vec![rule(EntityType::Page, 20, false)],
            },
        );
        let identity = user();
        let aliases = SlugAliases::default();
        let resolver = PermissionResolver::new(&identity, &snapshot, &aliases);

        assert!(resolver.can_access_route("/catalogue/offices"));
        assert!(!resolver.can_access_route("/news/offices"));
    }
}
