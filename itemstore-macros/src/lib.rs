//! Procedural macros for the itemstore project.
//!
//! `#[derive(Record)]` generates the static `RecordShape` of a payload type. The shape
//! follows the type's serde attributes, so the keys it lists are the keys the payload is
//! actually serialized under.
//!
//! Supported serde attributes:
//!
//! - container: `rename_all = "..."`
//! - field: `rename = "..."`, `flatten`, `skip`, `skip_serializing`
//!
//! The container attribute `#[record(name = "...")]` overrides the shape name.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type,
    Visibility, ext::IdentExt, meta::ParseNestedMeta, parse_macro_input,
};

/// Derives `itemstore::Record` for a struct.
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize, Record)]
/// #[serde(rename_all = "camelCase")]
/// pub struct Note {
///     pub title: String,
///     pub created_at: DateTime<Utc>,
/// }
/// ```
///
/// Deriving for an enum, a union or a tuple struct compiles, but opening a store for such
/// a type fails with a shape violation.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_record(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand_record(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let shape_name = record_name(&input.attrs)?.unwrap_or_else(|| ident.to_string());
    let container = SerdeContainer::parse(&input.attrs)?;

    let (kind, fields) = match &input.data {
        Data::Struct(data) => (quote!(Record), struct_fields(&data.fields, &container)?),
        Data::Enum(_) => (quote!(Enum), Vec::new()),
        Data::Union(_) => (quote!(Union), Vec::new()),
    };

    Ok(quote! {
        impl #impl_generics ::itemstore::Record for #ident #ty_generics #where_clause {
            fn shape() -> ::itemstore::shape::RecordShape {
                ::itemstore::shape::RecordShape::builder(
                    #shape_name,
                    ::itemstore::shape::ShapeKind::#kind,
                )
                #(.field(#fields))*
                .build()
            }
        }
    })
}

fn record_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut name = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("record")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported record attribute, expected `name`"))
            }
        })?;
    }

    Ok(name)
}

fn struct_fields(fields: &Fields, container: &SerdeContainer) -> syn::Result<Vec<TokenStream2>> {
    let mut descriptors = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let serde = SerdeField::parse(&field.attrs)?;
        if serde.skip {
            continue;
        }

        let name = field
            .ident
            .as_ref()
            .map_or_else(|| index.to_string(), |ident| ident.unraw().to_string());
        let key = match (&serde.rename, container.rename_all) {
            (Some(rename), _) => rename.clone(),
            (None, Some(rule)) if field.ident.is_some() => rule.apply(&name),
            _ => name.clone(),
        };
        let field_type = field_type(&field.ty);

        let mut descriptor = quote! {
            ::itemstore::shape::FieldDescriptor::new(#name, #field_type)
        };
        if key != name {
            descriptor = quote!(#descriptor.with_key(#key));
        }
        if !matches!(field.vis, Visibility::Public(_)) {
            descriptor = quote!(#descriptor.private());
        }
        if field.ident.is_none() || serde.flatten {
            descriptor = quote!(#descriptor.anonymous());
        }

        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

/// Maps a Rust type onto its semantic field type by the last path segment.
fn field_type(ty: &Type) -> TokenStream2 {
    let other = |ty: &Type| {
        let name = quote!(#ty).to_string().replace(' ', "");
        quote!(::itemstore::shape::FieldType::Other(#name.to_string()))
    };

    match ty {
        Type::Reference(reference) => field_type(&reference.elem),
        Type::Paren(paren) => field_type(&paren.elem),
        Type::Group(group) => field_type(&group.elem),
        Type::Array(array) => sequence_of(&array.elem),
        Type::Slice(slice) => sequence_of(&slice.elem),
        Type::Path(path) => {
            let Some(segment) = path.path.segments.last() else {
                return other(ty);
            };
            let args = generic_types(&segment.arguments);

            match segment.ident.to_string().as_str() {
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
                | "u128" | "usize" => quote!(::itemstore::shape::FieldType::Int),
                "f32" | "f64" => quote!(::itemstore::shape::FieldType::Float),
                "bool" => quote!(::itemstore::shape::FieldType::Bool),
                "String" | "str" | "char" => quote!(::itemstore::shape::FieldType::String),
                "DateTime" | "SystemTime" | "NaiveDateTime" => {
                    quote!(::itemstore::shape::FieldType::Timestamp)
                }
                "Uuid" | "ObjectId" => quote!(::itemstore::shape::FieldType::Identifier),
                "Option" if args.len() == 1 => {
                    let inner = field_type(args[0]);
                    quote!(::itemstore::shape::FieldType::Optional(::std::boxed::Box::new(#inner)))
                }
                "Vec" if args.len() == 1 && is_u8(args[0]) => {
                    quote!(::itemstore::shape::FieldType::Bytes)
                }
                "Vec" | "VecDeque" | "HashSet" | "BTreeSet" if args.len() == 1 => {
                    sequence_of(args[0])
                }
                "HashMap" | "BTreeMap" => quote!(::itemstore::shape::FieldType::Map),
                _ => other(ty),
            }
        }
        _ => other(ty),
    }
}

fn sequence_of(elem: &Type) -> TokenStream2 {
    let inner = field_type(elem);
    quote!(::itemstore::shape::FieldType::Sequence(::std::boxed::Box::new(#inner)))
}

fn generic_types(arguments: &PathArguments) -> Vec<&Type> {
    match arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn is_u8(ty: &Type) -> bool {
    matches!(ty, Type::Path(path) if path.path.is_ident("u8"))
}

/// Serde's `rename_all` rules.
#[derive(Debug, Clone, Copy)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(value: &LitStr) -> syn::Result<Self> {
        Ok(match value.value().as_str() {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            other => {
                return Err(syn::Error::new(
                    value.span(),
                    format!("unknown rename_all rule: {other}"),
                ));
            }
        })
    }

    /// Applies the rule to a snake_case field name the way serde renames fields.
    fn apply(self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
            RenameRule::Pascal => {
                let mut pascal = String::new();
                let mut capitalize = true;

                for ch in field.chars() {
                    if ch == '_' {
                        capitalize = true;
                    } else if capitalize {
                        pascal.push(ch.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        pascal.push(ch);
                    }
                }

                pascal
            }
            RenameRule::Camel => {
                let pascal = RenameRule::Pascal.apply(field);
                let mut chars = pascal.chars();

                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => pascal,
                }
            }
        }
    }
}

#[derive(Default)]
struct SerdeContainer {
    rename_all: Option<RenameRule>,
}

impl SerdeContainer {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut container = SerdeContainer::default();

        for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    container.rename_all = Some(serialize_rule(&meta)?);
                    Ok(())
                } else {
                    skip_meta(&meta)
                }
            })?;
        }

        Ok(container)
    }
}

/// Reads `rename_all = "..."` or the `serialize` half of `rename_all(...)`.
fn serialize_rule(meta: &ParseNestedMeta) -> syn::Result<RenameRule> {
    let mut rule = None;

    if meta.input.peek(syn::Token![=]) {
        rule = Some(RenameRule::parse(&meta.value()?.parse()?)?);
    } else {
        meta.parse_nested_meta(|nested| {
            if nested.path.is_ident("serialize") {
                rule = Some(RenameRule::parse(&nested.value()?.parse()?)?);
                Ok(())
            } else {
                skip_meta(&nested)
            }
        })?;
    }

    rule.ok_or_else(|| meta.error("rename_all without a serialize rule"))
}

#[derive(Default)]
struct SerdeField {
    rename: Option<String>,
    flatten: bool,
    skip: bool,
}

impl SerdeField {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut field = SerdeField::default();

        for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    field.rename = Some(serialize_name(&meta)?);
                    Ok(())
                } else if meta.path.is_ident("flatten") {
                    field.flatten = true;
                    Ok(())
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    field.skip = true;
                    Ok(())
                } else {
                    skip_meta(&meta)
                }
            })?;
        }

        Ok(field)
    }
}

/// Reads `rename = "..."` or the `serialize` half of `rename(...)`.
fn serialize_name(meta: &ParseNestedMeta) -> syn::Result<String> {
    if meta.input.peek(syn::Token![=]) {
        let value: LitStr = meta.value()?.parse()?;
        return Ok(value.value());
    }

    let mut name = None;
    meta.parse_nested_meta(|nested| {
        if nested.path.is_ident("serialize") {
            let value: LitStr = nested.value()?.parse()?;
            name = Some(value.value());
            Ok(())
        } else {
            skip_meta(&nested)
        }
    })?;

    name.ok_or_else(|| meta.error("rename without a serialize name"))
}

/// Consumes a serde attribute this macro has no use for.
fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|nested| skip_meta(&nested))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::RenameRule;

    #[test]
    fn rename_rules_follow_serde_field_renaming() {
        assert_eq!(RenameRule::Camel.apply("story_points"), "storyPoints");
        assert_eq!(RenameRule::Camel.apply("_draft_note"), "draftNote");
        assert_eq!(RenameRule::Camel.apply("I"), "i");
        assert_eq!(RenameRule::Pascal.apply("_draft_note"), "DraftNote");
        assert_eq!(RenameRule::Lower.apply("I"), "I");
        assert_eq!(RenameRule::ScreamingKebab.apply("due_at"), "DUE-AT");
    }
}
