#[cfg(test)]
mod tests {
    use crate::odata::*;
    use axum::extract::FromRequestParts;
    use axum::http::{Request, StatusCode};

    async fn extract(uri: &str) -> Result<ODataQuery, crate::ErrorResponse> {
        let request = Request::builder().uri(uri).body(()).unwrap();
        let (mut parts, _body) = request.into_parts();
        extract_odata_query(&mut parts, &()).await
    }

    #[test]
    fn test_parse_orderby_simple() {
        let result = parse_orderby("lastName desc").unwrap();
        assert_eq!(result.0.len(), 1);
        assert_eq!(result.0[0].field, "lastName");
        assert_eq!(result.0[0].dir, SortDir::Desc);
    }

    #[test]
    fn test_parse_orderby_multiple_fields() {
        let result = parse_orderby("creditLimit desc, id asc, lastName").unwrap();
        assert_eq!(result.0.len(), 3);

        assert_eq!(result.0[0].field, "creditLimit");
        assert_eq!(result.0[0].dir, SortDir::Desc);

        assert_eq!(result.0[1].field, "id");
        assert_eq!(result.0[1].dir, SortDir::Asc);

        assert_eq!(result.0[2].field, "lastName");
        assert_eq!(result.0[2].dir, SortDir::Asc); // default
    }

    #[test]
    fn test_parse_orderby_direction_is_case_insensitive() {
        let result = parse_orderby("id DESC").unwrap();
        assert_eq!(result.0[0].dir, SortDir::Desc);
    }

    #[test]
    fn test_parse_orderby_whitespace_tolerance() {
        let result = parse_orderby("  lastName   desc  ,   id   asc  ").unwrap();
        assert_eq!(result.0.len(), 2);
        assert_eq!(result.0[0].field, "lastName");
        assert_eq!(result.0[1].field, "id");
    }

    #[test]
    fn test_parse_orderby_empty() {
        assert!(parse_orderby("").unwrap().is_empty());
        assert!(parse_orderby("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_orderby_too_long() {
        let long_orderby = "a".repeat(MAX_ORDERBY_LEN + 1);
        assert!(matches!(
            parse_orderby(&long_orderby),
            Err(odata_core::Error::InvalidOrderByField(_))
        ));
    }

    #[test]
    fn test_parse_orderby_too_many_fields() {
        let many_fields: Vec<String> = (0..=MAX_ORDER_FIELDS)
            .map(|i| format!("field{}", i))
            .collect();
        assert!(matches!(
            parse_orderby(&many_fields.join(", ")),
            Err(odata_core::Error::InvalidOrderByField(_))
        ));
    }

    #[test]
    fn test_parse_orderby_invalid_clause() {
        assert!(matches!(
            parse_orderby("field invalid_direction"),
            Err(odata_core::Error::InvalidOrderByField(_))
        ));
        assert!(parse_orderby("1field").is_err());
    }

    #[test]
    fn test_parse_select() {
        assert_eq!(
            parse_select("id, lastName").unwrap(),
            Some(vec!["id".to_string(), "lastName".to_string()])
        );
        assert_eq!(parse_select("*").unwrap(), None);
        assert_eq!(parse_select(" ").unwrap(), None);
        assert!(matches!(
            parse_select("id, last-name"),
            Err(odata_core::Error::InvalidSelectField(_))
        ));

        let many: Vec<String> = (0..=MAX_SELECT_FIELDS).map(|i| format!("f{i}")).collect();
        assert!(parse_select(&many.join(",")).is_err());
    }

    #[test]
    fn test_parse_expand() {
        assert_eq!(
            parse_expand("orders, orders/lines").unwrap(),
            vec!["orders".to_string(), "orders/lines".to_string()]
        );
        assert!(parse_expand("").unwrap().is_empty());
        assert!(parse_expand("orders//lines").is_err());
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse_top("-5").unwrap(), -5);
        assert!(parse_top("ten").is_err());
        assert_eq!(parse_skip("250").unwrap(), 250);
        assert!(parse_skip("-1").is_err());
        assert!(parse_count("TRUE").unwrap());
        assert!(!parse_count("false").unwrap());
        assert!(parse_count("yes").is_err());
    }

    #[tokio::test]
    async fn test_extract_odata_query_full() {
        let uri = "/?%24filter=emailAddress%20eq%20%27test%40example.com%27&%24orderby=lastName%20desc&%24select=id,lastName&%24top=25&%24skip=50&%24count=false";
        let query = extract(uri).await.unwrap();

        assert!(query.filter.is_some());
        assert_eq!(query.order.0.len(), 1);
        assert_eq!(query.select.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(query.top, Some(25));
        assert_eq!(query.skip, 50);
        assert_eq!(query.count, Some(false));
    }

    #[tokio::test]
    async fn test_extract_odata_query_empty() {
        let query = extract("/").await.unwrap();

        assert!(query.filter.is_none());
        assert!(query.order.is_empty());
        assert!(query.select.is_none());
        assert!(query.expand.is_empty());
        assert_eq!(query.top, None);
        assert_eq!(query.skip, 0);
        assert_eq!(query.count, None);
    }

    #[tokio::test]
    async fn test_extract_keeps_out_of_range_top_for_the_pipeline() {
        let query = extract("/?%24top=5000").await.unwrap();
        assert_eq!(query.top, Some(5000));

        let query = extract("/?%24top=0").await.unwrap();
        assert_eq!(query.top, Some(0));
    }

    #[tokio::test]
    async fn test_extract_odata_query_filter_too_long() {
        let long_filter = "lastName eq '".to_string() + &"a".repeat(MAX_FILTER_LEN) + "'";
        let uri = format!("/?%24filter={}", urlencoding::encode(&long_filter));

        let err = extract(&uri).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Filter too long");
    }

    #[tokio::test]
    async fn test_extract_odata_query_invalid_filter() {
        let err = extract("/?%24filter=invalid%20syntax%20here")
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message().starts_with("invalid $filter"));
    }

    #[tokio::test]
    async fn test_extract_odata_query_invalid_orderby() {
        let err = extract("/?%24orderby=field%20invalid_direction")
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_extract_odata_query_invalid_skip() {
        let err = extract("/?%24skip=-10").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message().contains("$skip"));
    }

    #[tokio::test]
    async fn test_odata_extractor() {
        let uri = "/?%24filter=emailAddress%20eq%20%27test%40example.com%27&%24top=10";
        let request = Request::builder().uri(uri).body(()).unwrap();
        let (mut parts, _body) = request.into_parts();

        let odata = OData::from_request_parts(&mut parts, &()).await.unwrap();

        assert!(odata.has_filter());
        assert_eq!(odata.top, Some(10));
    }

    #[test]
    fn test_odata_deref() {
        use odata_core::ast::*;

        let query = ODataQuery::default().with_filter(Expr::Identifier("test".to_string()));
        let odata = OData(query);

        assert!(odata.has_filter());

        let query_back: ODataQuery = odata.into();
        assert!(query_back.has_filter());
    }
}
