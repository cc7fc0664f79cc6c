use formedible_dsl::{normalize, parse, to_source};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const FORM_MIN: &str = r#"{ fields: [{ name: "age", type: "number", label: "Age" }] }"#;

const FORM_REPLY: &str = r#"Here is the signup form you asked for:

```formedible
const formSchema = z.object({
  firstName: z.string().min(1, "First name is required"),
  email: z.string().email().optional(),
  plan: z.enum(["free", "pro"]).default("free"),
  address: z.object({
    street: z.string(),
    city: z.string().min(2),
  }),
});

{
  title: "Signup",
  schema: formSchema,
  fields: [
    { name: "firstName", type: "text", label: "First name", page: 1 },
    { name: "email", type: "email", label: "Email", page: 1 },
    { name: "plan", type: "select", options: [{ value: "free", label: "Free" }, { value: "pro", label: "Pro" }], page: 2 },
    {
      name: "address",
      type: "object",
      page: 2,
      objectConfig: {
        title: "Address",
        fields: [
          { name: "street", type: "text" },
          { name: "city", type: "text" },
        ],
      },
    },
  ],
  pages: [{ page: 1, title: "Account" }, { page: 2, title: "Details" }],
  settings: { submitLabel: "Create account", showProgress: true },
}
```
"#;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse/min", |b| {
        b.iter(|| {
            let outcome = parse(black_box(FORM_MIN)).expect("parse form");
            black_box(outcome.config.fields.len());
        });
    });

    c.bench_function("parse/fenced_reply", |b| {
        b.iter(|| {
            let outcome = parse(black_box(FORM_REPLY)).expect("parse form");
            black_box(outcome.config.fields.len());
        });
    });
}

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize/fenced_reply", |b| {
        b.iter(|| {
            let normalized = normalize(black_box(FORM_REPLY)).expect("normalize");
            black_box(normalized.candidate.len());
        });
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let parsed = parse(FORM_REPLY).expect("parse form").config;
    c.bench_function("printer/round_trip", |b| {
        b.iter(|| {
            let printed = to_source(black_box(&parsed));
            let outcome = parse(&printed).expect("reparse");
            black_box(outcome.config.fields.len());
        });
    });
}

criterion_group!(benches, bench_parse, bench_normalize, bench_round_trip);
criterion_main!(benches);
