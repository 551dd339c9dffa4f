mod image_cases;
