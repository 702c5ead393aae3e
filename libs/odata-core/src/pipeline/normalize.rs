use crate::{ODataQuery, ODataSettings, RequestContext};

pub const COUNT_PARAM: &str = "$count";

/// Directives and request context after normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized {
    pub query: ODataQuery,
    pub context: RequestContext,
}

/// Force an explicit count request and rewrite the request origin to the advertised one.
///
/// The count flag is only injected when the client left it out; an explicit
/// `$count=false` is kept. The origin rewrite happens before any link is produced so
/// links point at the public endpoint rather than the address behind the proxy.
pub fn normalize(
    mut query: ODataQuery,
    mut context: RequestContext,
    settings: &ODataSettings,
) -> Normalized {
    if query.count.is_none() {
        query.count = Some(true);
        if !context.has_query_key(COUNT_PARAM) {
            context
                .query
                .push((COUNT_PARAM.to_string(), "true".to_string()));
        }
    }

    context.host = settings.host_name.clone();
    context.scheme = settings.scheme().to_string();

    Normalized { query, context }
}
