//! # hotref - reference validator for Heat orchestration templates
//!
//! For usage of the command line tool see `hotref --help`.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `hotref` works internally.
//!
//! ### HOT Terms
//!
//! - a `template` is a yaml document with the sections `parameters`, `resources` and `outputs`
//! - a `resource` has a `type`. A type ending in `.yaml` names another template, the `child` of the resource
//! - the `properties` of a resource are the values passed to the parameters of its child
//! - an `environment` is a yaml document with a `resource_registry` (type substitutions), `parameters` and
//!   `parameter_defaults`
//!
//! References are written as single-key mappings anywhere in a template:
//! ```yaml
//! resources:
//!   server:
//!     type: OS::Nova::Server
//!     properties:
//!       image: { get_param: image }                       # parameter of this template
//!       networks:
//!         - port: { get_resource: port }                  # resource of this template
//!         - subnet: { get_attr: [net, subnets, 0] }       # output (or attribute) of a resource
//! ```
//!
//! ### Loading
//!
//! see [loader::Loader]
//!
//! The root template is parsed into a [value::Value] tree, with `get_*` mappings turned into [value::Intrinsic]s once.
//! Every resource naming a template gets that template loaded as its child. All templates live in one
//! [model::Forest] and refer to each other by id. A template including one of its ancestors is a fatal error.
//!
//! Documents come from a [source::Source], the file system for the binary and memory for tests.
//!
//! ### Mapping
//!
//! see [mapping::apply]
//!
//! Environments rewrite resource types through their resource registry until no rule applies. Rules may be scoped to a
//! single resource name, or use a wildcard:
//!
//! | rule                                        | resource type          | result                 |
//! |---------------------------------------------|------------------------|------------------------|
//! | `OS::Custom::Server: server.yaml`           | `OS::Custom::Server`   | `server.yaml`          |
//! | `OS::Custom::Net*: file:net_*.yaml`         | `OS::Custom::NetPublic`| `file:net_Public.yaml` |
//! | `resources: {db: {OS::Nova::Server: db.yaml}}` | `OS::Nova::Server` of `db` | `db.yaml`        |
//!
//! A resource mapped to a template gets it as its (new) child.
//!
//! ### Reconciliation
//!
//! see [reconcile::reconcile]
//!
//! Properties of a resource and parameters of its child must match up. Mismatches are reported, matching pairs are
//! merged into one record so that the child's `get_param` sees the value given by the parent.
//!
//! ### Resolution
//!
//! see [resolve::Resolver]
//!
//! Each intrinsic call is resolved in the scope of the template it is written in. `get_param` and `get_attr` are
//! small state machines walking the reference hierarchy; values are only followed as far as the hierarchy needs.
//! Every successful reference marks its target as used.
//!
//! ### Output
//!
//! Problems are collected as [model::Diagnostic]s on the template or environment they belong to. A
//! [report::Report] summarizes them, together with unused parameters and resources.
//!
pub mod depends;
pub mod loader;
pub mod mapping;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod resolve;
pub mod source;
pub mod validator;
pub mod value;
mod visit;
