use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, Lit, PathArguments,
    Type,
};

#[proc_macro_derive(AgentDefinition, attributes(agent, field))]
pub fn derive_agent_definition(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    // Extract agent metadata from #[agent(...)]
    let agent_meta = extract_agent_meta(&input.attrs);

    // Extract field schemas from struct fields
    let field_schemas: Vec<proc_macro2::TokenStream> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields
                .named
                .iter()
                .map(|f| {
                    let name = f.ident.as_ref().unwrap().to_string();

                    let field_type = infer_field_type(&f.ty);
                    let (label, description, field_type_override) = extract_field_meta(&f.attrs);
                    let cli_arg = format!("--{}", name.replace('_', "-"));
                    let required = !is_option_type(&f.ty) && !is_vec_type(&f.ty);
                    let default = extract_default(&f.attrs);

                    // Use override if provided, otherwise infer
                    let final_field_type = field_type_override.unwrap_or(field_type);

                    quote! {
                        novel_agent_sdk::FieldSchema {
                            name: #name.to_string(),
                            field_type: #final_field_type,
                            label: #label.to_string(),
                            description: #description.to_string(),
                            cli_arg: #cli_arg.to_string(),
                            required: #required,
                            default: #default,
                        }
                    }
                })
                .collect(),
            _ => panic!("AgentDefinition only supports named fields"),
        },
        _ => panic!("AgentDefinition only supports structs"),
    };

    let struct_name = &input.ident;
    let agent_id = &agent_meta.id;
    let agent_name = &agent_meta.name;
    let agent_desc = &agent_meta.description;
    let agent_stage = stage_token(&agent_meta.stage);

    let expanded = quote! {
        impl novel_agent_sdk::AgentDefinition for #struct_name {
            fn metadata() -> novel_agent_sdk::AgentMetadata {
                novel_agent_sdk::AgentMetadata {
                    id: #agent_id.to_string(),
                    name: #agent_name.to_string(),
                    description: #agent_desc.to_string(),
                    stage: #agent_stage,
                }
            }

            fn fields() -> Vec<novel_agent_sdk::FieldSchema> {
                vec![#(#field_schemas),*]
            }

            fn print_metadata(&self) {
                let full_metadata = novel_agent_sdk::FullAgentMetadata {
                    metadata: Self::metadata(),
                    fields: Self::fields(),
                };
                let json = serde_json::to_string_pretty(&full_metadata).unwrap();
                println!("{}", json);
            }
        }
    };

    TokenStream::from(expanded)
}

struct AgentMeta {
    id: String,
    name: String,
    description: String,
    stage: String,
}

fn extract_agent_meta(attrs: &[Attribute]) -> AgentMeta {
    for attr in attrs {
        if attr.path().is_ident("agent") {
            let mut id = String::new();
            let mut name = String::new();
            let mut description = String::new();
            let mut stage = String::new();

            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        id = s.value();
                    }
                } else if meta.path.is_ident("name") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        name = s.value();
                    }
                } else if meta.path.is_ident("description") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        description = s.value();
                    }
                } else if meta.path.is_ident("stage") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        stage = s.value();
                    }
                }
                Ok(())
            });

            return AgentMeta {
                id,
                name,
                description,
                stage,
            };
        }
    }

    panic!("Missing #[agent(...)] attribute");
}

fn stage_token(stage: &str) -> proc_macro2::TokenStream {
    match stage {
        "plot" => quote! { novel_agent_sdk::AgentStage::Plot },
        "outline" => quote! { novel_agent_sdk::AgentStage::Outline },
        "writing" => quote! { novel_agent_sdk::AgentStage::Writing },
        "validation" => quote! { novel_agent_sdk::AgentStage::Validation },
        "diagram" => quote! { novel_agent_sdk::AgentStage::Diagram },
        other => panic!(
            "Unknown stage '{}' (expected plot, outline, writing, validation or diagram)",
            other
        ),
    }
}

fn extract_field_meta(attrs: &[Attribute]) -> (String, String, Option<proc_macro2::TokenStream>) {
    let mut label = String::new();
    let mut description = String::new();
    let mut field_type = None;
    let mut min = None;
    let mut max = None;
    let mut options = None;

    for attr in attrs {
        if attr.path().is_ident("field") {
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("label") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        label = s.value();
                    }
                } else if meta.path.is_ident("description") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        description = s.value();
                    }
                } else if meta.path.is_ident("type") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        field_type = Some(s.value());
                    }
                } else if meta.path.is_ident("min") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        min = s.value().parse::<i64>().ok();
                    }
                } else if meta.path.is_ident("max") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        max = s.value().parse::<i64>().ok();
                    }
                } else if meta.path.is_ident("options") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        options = Some(s.value());
                    }
                }
                Ok(())
            });
        }
    }

    // Build field type from parsed values
    let field_type_token = field_type.map(|ft| match ft.as_str() {
        "text" => quote! { novel_agent_sdk::FieldType::Text },
        "number" => {
            let min_token = min.map(|m| quote! { Some(#m) }).unwrap_or(quote! { None });
            let max_token = max.map(|m| quote! { Some(#m) }).unwrap_or(quote! { None });
            quote! { novel_agent_sdk::FieldType::Number { min: #min_token, max: #max_token } }
        }
        "list" => quote! { novel_agent_sdk::FieldType::List },
        "select" => {
            let opts: Vec<String> = options
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            quote! { novel_agent_sdk::FieldType::Select { options: vec![#(#opts.to_string()),*] } }
        }
        _ => quote! { novel_agent_sdk::FieldType::Text },
    });

    (label, description, field_type_token)
}

fn infer_field_type(ty: &Type) -> proc_macro2::TokenStream {
    // Unwrap Option<T> before inferring
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner_ty)) = args.args.first() {
                        return infer_field_type_inner(inner_ty);
                    }
                }
            } else {
                return infer_field_type_inner(ty);
            }
        }
    }

    quote! { novel_agent_sdk::FieldType::Text }
}

fn infer_field_type_inner(ty: &Type) -> proc_macro2::TokenStream {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            let type_name = segment.ident.to_string();
            match type_name.as_str() {
                "String" => quote! { novel_agent_sdk::FieldType::Text },
                "Vec" => quote! { novel_agent_sdk::FieldType::List },
                "usize" | "u8" | "u32" | "u64" | "i32" | "i64" => {
                    quote! { novel_agent_sdk::FieldType::Number { min: None, max: None } }
                }
                _ => quote! { novel_agent_sdk::FieldType::Text },
            }
        } else {
            quote! { novel_agent_sdk::FieldType::Text }
        }
    } else {
        quote! { novel_agent_sdk::FieldType::Text }
    }
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

fn is_vec_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Vec";
        }
    }
    false
}

fn extract_default(attrs: &[Attribute]) -> proc_macro2::TokenStream {
    for attr in attrs {
        if attr.path().is_ident("field") {
            let mut default_value = None;

            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(s) = lit {
                        default_value = Some(s.value());
                    }
                }
                Ok(())
            });

            if let Some(val) = default_value {
                return quote! { Some(#val.to_string()) };
            }
        }
    }

    quote! { None }
}
